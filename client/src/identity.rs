//! Identity token persistence, the file-based equivalent of the browser
//! client's cookie

use std::fs;
use std::io;
use std::path::Path;

/// Loads a previously saved identity token. Missing, unreadable, or empty
/// files all mean "no identity": the client then keeps whatever the server
/// assigns.
pub fn load(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Saves the identity token for the next run to reclaim.
pub fn save(path: &Path, token: &str) -> io::Result<()> {
    fs::write(path, token)
}
