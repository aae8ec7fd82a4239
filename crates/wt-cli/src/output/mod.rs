//! Coloured status lines for the terminal

use std::io::Write;

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

fn print_line(out: &mut impl Write, color: Color, symbol: &str, msg: &str) {
    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(symbol),
        Print(" "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_line(&mut std::io::stdout(), Color::Green, "✓", msg);
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    print_line(&mut std::io::stderr(), Color::Red, "✗", msg);
}

/// Print a warning in yellow
pub fn print_warning(msg: &str) {
    print_line(&mut std::io::stderr(), Color::Yellow, "⚠", msg);
}

pub fn print_info(msg: &str) {
    print_line(&mut std::io::stdout(), Color::Cyan, "ℹ", msg);
}
