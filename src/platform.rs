//! Platform folder naming

/// Console names whose folder differs from the sanitized name, matched lowercase
const ALIASES: &[(&str, &str)] = &[
    ("nes/famicom", "NES"),
    ("nes", "NES"),
    ("nintendo entertainment system", "NES"),
    ("nintendo entertainment system (nes)", "NES"),
    ("famicom disk system", "FDS"),
    ("snes/super famicom", "SNES"),
    ("snes", "SNES"),
    ("super nintendo", "SNES"),
    ("super nintendo (snes)", "SNES"),
    ("super nintendo entertainment system", "SNES"),
    ("nintendo 64", "N64"),
    ("nintendo ds", "NDS"),
    ("nintendo 3ds", "3DS"),
    ("game boy", "GAME_BOY"),
    ("game boy (original)", "GAME_BOY"),
    ("game boy advance", "GAME_BOY_ADVANCE"),
    ("game boy advance (gba)", "GAME_BOY_ADVANCE"),
    ("genesis/mega drive", "GENESIS"),
    ("sega genesis / mega drive", "GENESIS"),
    ("mega drive", "GENESIS"),
    ("master system", "MASTER_SYSTEM"),
    ("sega master system", "MASTER_SYSTEM"),
    ("game gear", "GAME_GEAR"),
    ("sega game gear", "GAME_GEAR"),
    ("playstation", "PS1"),
    ("playstation 1 (ps1)", "PS1"),
    ("playstation 2", "PS2"),
    ("playstation 2 (ps2)", "PS2"),
    ("playstation portable", "PSP"),
    ("pc engine/turbografx-16", "PCE"),
    ("turbografx-16 / pc engine", "PCE"),
    ("pc engine cd/turbografx-cd", "PCE_CD"),
    ("atari 2600", "ATARI_2600"),
    ("arcade", "ARCADE"),
    ("neo geo pocket", "NEO_GEO_POCKET"),
    ("neo geo pocket color", "NEO_GEO_POCKET_COLOR"),
    ("pc (dos/windows)", "PC"),
    ("dos", "PC"),
    ("commodore 64", "C64"),
];

/// Deterministic folder name for a console name.
///
/// Known console names map through the alias table; anything else is
/// uppercased with every run of non-alphanumeric characters collapsed to `_`.
/// Returns `None` when nothing usable remains.
pub fn platform_folder(console_name: &str) -> Option<String> {
    let trimmed = console_name.trim();
    let lowered = trimmed.to_lowercase();

    if let Some((_, alias)) = ALIASES.iter().find(|(name, _)| *name == lowered) {
        return Some(alias.to_string());
    }

    let mut folder = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if c.is_ascii_alphanumeric() {
            folder.push(c.to_ascii_uppercase());
        } else if !folder.is_empty() && !folder.ends_with('_') {
            folder.push('_');
        }
    }
    while folder.ends_with('_') {
        folder.pop();
    }

    if folder.is_empty() {
        None
    } else {
        Some(folder)
    }
}
