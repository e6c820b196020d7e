#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const SPEED_FOCUS: &str = "Speed Focus - Challenge - 2025.01.02-03.04.10 Stats.csv";
pub const TILE_FRENZY: &str = "Tile Frenzy - Challenge - 2025.01.03-09.00.00 Stats.csv";
pub const AIR_TRACKING: &str = "Air Tracking 180 - Challenge - 2025.01.04-18.30.00 Stats.csv";

/// A session log in the layout the trainer exports: a per-kill table,
/// a weapon table, then `Key:,Value` lines.
pub fn log_body(hits: u32, misses: u32) -> String {
    format!(
        "Kill #,Timestamp,Bot,Weapon,TTK,Shots,Hits,Accuracy,Damage Done,Damage Possible,Efficiency,Cheated,OverShots\n\
         1,03:04:05.000,BotA,Pistol,0.500000s,2,1,0.5,100.0,100.0,1.0,false,0\n\
         2,03:04:06.500,BotA,Pistol,0.400000s,1,1,1.0,100.0,100.0,1.0,false,0\n\
         3,03:04:08.000,BotB,Pistol,0.300000s,1,1,1.0,100.0,100.0,1.0,false,0\n\
         \n\
         Weapon,Shots,Hits,Damage Done,Damage Possible,,,,,,,Sens Scale,Horiz Sens,Vert Sens,FOV,Hide Gun,Crosshair,Crosshair Scale,Crosshair Color,ADS Sens,ADS Zoom Scale\n\
         Pistol,{shots},{hits},300.0,300.0,,,,,,,Valorant,0.4,0.4,103,false,default.png,1.0,FFFFFF,0.4,1.0\n\
         \n\
         Kills:,3\n\
         Deaths:,0\n\
         Fight Time:,3.0\n\
         Hit Count:,{hits}\n\
         Miss Count:,{misses}\n\
         Score:,512.5\n\
         Scenario:,Speed Focus\n\
         Challenge Start:,03:03:10.000\n\
         Game Version:,3.7.0\n",
        shots = hits + misses,
    )
}

pub fn write_log(dir: &Path, name: &str, hits: u32, misses: u32) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, log_body(hits, misses)).unwrap();
    path
}

/// `count` logs with distinct names, one minute apart.
pub fn write_numbered_logs(dir: &Path, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let name = format!(
                "Drill {i:03} - Challenge - 2025.02.01-{:02}.{:02}.00 Stats.csv",
                i / 60,
                i % 60
            );
            write_log(dir, &name, 8, 2);
            name
        })
        .collect()
}
