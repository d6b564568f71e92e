//! Text rendering of a bingo board as a 5x5 grid

/// Cells per row/column of the rendered grid
pub const VIEW_SIZE: usize = 5;

/// Widest label before truncation
const CELL_WIDTH: usize = 16;

/// Index where the free cell is inserted, turning 24 board cells into a
/// 5x5 grid
const FREE_INDEX: usize = 12;

/// Renders the board with `[X]` marks on cells whose text is in the
/// happened set. The free center cell is always marked.
pub fn render(board: &[String], happened: &[String]) -> String {
    let mut labels: Vec<(String, bool)> = board
        .iter()
        .map(|cell| (cell.replace('\n', " "), happened.contains(cell)))
        .collect();

    if labels.len() >= FREE_INDEX {
        labels.insert(FREE_INDEX, ("FREE".to_string(), true));
    }

    let mut out = String::new();
    for row in labels.chunks(VIEW_SIZE) {
        for (text, marked) in row {
            let mark = if *marked { "[X]" } else { "[ ]" };
            let label: String = text.chars().take(CELL_WIDTH).collect();
            out.push_str(&format!("{} {:<width$} ", mark, label, width = CELL_WIDTH));
        }
        out.push('\n');
    }

    out
}
