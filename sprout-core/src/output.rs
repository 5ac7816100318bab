//! # Output Formatting
//!
//! Emoji-prefixed status lines and colored fragments for everything sprout
//! prints to the terminal. Errors go to stderr, the rest to stdout.

use owo_colors::{OwoColorize, Stream, Style};
use {clap, emojis};

/// When to color terminal output
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
  /// Always color
  Yes,
  /// Alias for `yes`
  Always,
  /// Color when the terminal supports it
  Auto,
  /// Never color
  No,
  /// Alias for `no`
  Never,
}

impl ColorMode {
  /// Apply the mode to owo-colors and to the console styles used by the
  /// dialoguer theme.
  pub fn apply(self) {
    let enabled = match self {
      ColorMode::Always | ColorMode::Yes => true,
      ColorMode::Never | ColorMode::No => false,
      // Leave detection to owo-colors and console
      ColorMode::Auto => return,
    };
    owo_colors::set_override(enabled);
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
  }
}

/// Style `text` for `stream`, or leave it plain when colors are off for that
/// stream. Every colored fragment goes through here so `--colors` is honored.
pub fn paint(text: &str, stream: Stream, style: Style) -> String {
  text.if_supports_color(stream, |text| text.style(style)).to_string()
}

#[derive(Debug, Clone, Copy)]
enum Status {
  Success,
  Error,
  Warning,
  Info,
}

impl Status {
  /// Emoji shortcode and the plain glyph used when the shortcode is unknown
  fn marker(self) -> (&'static str, &'static str) {
    match self {
      Status::Success => ("check_mark", "✓"),
      Status::Error => ("cross_mark", "✗"),
      Status::Warning => ("warning", "⚠"),
      Status::Info => ("information", "ℹ"),
    }
  }

  fn style(self) -> Style {
    let style = Style::new().bold();
    match self {
      Status::Success => style.green(),
      Status::Error => style.red(),
      Status::Warning => style.yellow(),
      Status::Info => style.blue(),
    }
  }

  fn stream(self) -> Stream {
    match self {
      Status::Error => Stream::Stderr,
      _ => Stream::Stdout,
    }
  }

  fn line(self, message: &str) -> String {
    let (shortcode, fallback) = self.marker();
    let marker = get_emoji_or_default(shortcode, fallback);
    format!("{} {message}", paint(&marker, self.stream(), self.style()))
  }
}

/// Look up an emoji by shortcode, falling back to `default`.
pub fn get_emoji_or_default(name: &str, default: &str) -> String {
  emojis::get_by_shortcode(name).map_or_else(|| default.to_string(), ToString::to_string)
}

pub fn print_success(message: &str) {
  println!("{}", Status::Success.line(message));
}

pub fn print_error(message: &str) {
  eprintln!("{}", Status::Error.line(message));
}

pub fn print_warning(message: &str) {
  println!("{}", Status::Warning.line(message));
}

pub fn print_info(message: &str) {
  println!("{}", Status::Info.line(message));
}

/// Print a section header preceded by a blank line
pub fn print_header(header: &str) {
  println!("\n{}", paint(header, Stream::Stdout, Style::new().blue().bold()));
}

/// Format a repository or file path
pub fn format_repo_path(path: &str) -> String {
  paint(path, Stream::Stdout, Style::new().bright_green())
}

pub fn format_branch(name: &str) -> String {
  paint(name, Stream::Stdout, Style::new().yellow())
}

/// Format a command the operator can copy and run
pub fn format_command(cmd: &str) -> String {
  paint(cmd, Stream::Stdout, Style::new().purple())
}
