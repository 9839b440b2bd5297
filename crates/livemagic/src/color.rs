//! CLI color helpers.
//!
//! All functions respect `NO_COLOR`, `FORCE_COLOR` and TTY detection through
//! `owo-colors`' `if_supports_color()`. `--no-color` sets an in-process flag
//! that bypasses owo-colors entirely.

use std::sync::atomic::{AtomicBool, Ordering};

use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};

/// Set by `--no-color`.
static NO_COLOR_FLAG: AtomicBool = AtomicBool::new(false);

/// Call once from main.rs when `--no-color` is passed.
pub fn set_no_color() {
    NO_COLOR_FLAG.store(true, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy)]
struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}

impl Rgb {
    const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
        }
    }
}

const SWIRL: Rgb = Rgb::from_hex(0xD70A53); // Section headers
const SKY: Rgb = Rgb::from_hex(0x6FA8DC); // Keys and paths
const MEADOW: Rgb = Rgb::from_hex(0x6AA84F); // Success
const AMBER: Rgb = Rgb::from_hex(0xE69138); // Unsaved/changed
const SLATE: Rgb = Rgb::from_hex(0x5C6370); // Secondary info

fn no_color() -> bool {
    NO_COLOR_FLAG.load(Ordering::Relaxed)
}

fn paint(text: &str, stream: owo_colors::Stream, rgb: Rgb) -> String {
    if no_color() {
        return text.to_string();
    }
    text.if_supports_color(stream, |t| t.truecolor(rgb.r, rgb.g, rgb.b))
        .to_string()
}

/// Section names.
pub fn section(text: &str) -> String {
    paint(text, Stdout, SWIRL)
}

/// Key names and paths.
pub fn key(text: &str) -> String {
    paint(text, Stdout, SKY)
}

/// Completed actions.
pub fn success(text: &str) -> String {
    paint(text, Stdout, MEADOW)
}

/// Values that differ from disk.
pub fn changed(text: &str) -> String {
    paint(text, Stdout, AMBER)
}

pub fn muted(text: &str) -> String {
    paint(text, Stdout, SLATE)
}

pub fn bold(text: &str) -> String {
    if no_color() {
        return text.to_string();
    }
    text.if_supports_color(Stdout, |t| t.bold()).to_string()
}

/// Error styling for stderr messages.
pub fn error(text: &str) -> String {
    paint(text, Stderr, SWIRL)
}

/// Secondary info on stderr.
pub fn hint(text: &str) -> String {
    paint(text, Stderr, SLATE)
}
