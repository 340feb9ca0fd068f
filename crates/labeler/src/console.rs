//! Human-facing console messages on stderr
//!
//! Every line of a message gets a colored level prefix, so multi-line
//! messages stay aligned.

use colored::*;

fn format_prefix(color: Color, prefix: &str) -> String {
  format!("[{}]{:<width$}", prefix.color(color).bold(), "", width = 7 - prefix.len() - 2)
}

fn emit(color: Color, prefix: &str, message: &str) {
  let prefix = format_prefix(color, prefix);
  for line in message.lines() {
    eprintln!("{prefix} {line}");
  }
}

pub fn info(message: &str) {
  emit(Color::Blue, "info", message);
}

pub fn warn(message: &str) {
  emit(Color::Yellow, "warn", message);
}

pub fn error(message: &str) {
  emit(Color::Red, "error", message);
}

pub fn success(message: &str) {
  emit(Color::Green, "sccs", message);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_prefixes_pad_to_same_width() {
    colored::control::set_override(false);
    assert_eq!(format_prefix(Color::Blue, "info"), "[info] ");
    assert_eq!(format_prefix(Color::Red, "error"), "[error]");
    colored::control::unset_override();
  }
}
