//! Terminal output for `warden-server init` and the startup banner.
//!
//! Status lines start with a glyph coloured by owo-colors, or with a
//! bracketed tag such as `[ok]` under `--no-color`.

use owo_colors::OwoColorize;

/// Leading marker of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Done,
    Note,
    Warn,
    Fail,
    Skip,
}

impl Mark {
    fn tag(self) -> &'static str {
        match self {
            Mark::Done => "[ok]",
            Mark::Note => "[..]",
            Mark::Warn => "[warn]",
            Mark::Fail => "[fail]",
            Mark::Skip => "[skip]",
        }
    }

    fn glyph(self) -> String {
        match self {
            Mark::Done => "✓".green().bold().to_string(),
            Mark::Note => "›".blue().to_string(),
            Mark::Warn => "!".yellow().bold().to_string(),
            Mark::Fail => "✗".red().bold().to_string(),
            Mark::Skip => "-".yellow().to_string(),
        }
    }
}

/// Writes status lines to the terminal.
pub struct Output {
    /// Colour glyphs and text with ANSI escapes
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Coloured output.
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Plain output with bracketed tags.
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    fn render(&self, mark: Mark, text: &str) -> String {
        if self.colored {
            format!("  {} {}", mark.glyph(), text)
        } else {
            format!("  {} {}", mark.tag(), text)
        }
    }

    /// Name and version, printed before `init` output and at startup.
    pub fn banner(&self) {
        let version = env!("CARGO_PKG_VERSION");
        if self.colored {
            println!("\n  {} {}\n", "warden".bright_cyan().bold(), version.dimmed());
        } else {
            println!("\n  warden {}\n", version);
        }
    }

    /// Section title.
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bold().underline());
        } else {
            println!("\n  # {}", title);
        }
    }

    /// Step title within a section.
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan());
        } else {
            println!("\n  ## {}", title);
        }
    }

    /// Neutral status line.
    pub fn info(&self, message: &str) {
        println!("{}", self.render(Mark::Note, message));
    }

    /// Something the operator should look at.
    pub fn warning(&self, message: &str) {
        println!("{}", self.render(Mark::Warn, message));
    }

    /// Goes to stderr.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.render(Mark::Fail, message));
    }

    /// `kind` says what was written (config, env, file).
    pub fn created(&self, kind: &str, path: &str) {
        println!("{}", self.render(Mark::Done, &format!("{} {}", kind, path)));
    }

    /// A directory was created.
    pub fn created_dir(&self, path: &str) {
        self.created("dir", path);
    }

    /// A path was left as it was.
    pub fn skipped(&self, path: &str, reason: &str) {
        println!("{}", self.render(Mark::Skip, &format!("{} ({})", path, reason)));
    }

    /// Aligned `key value` pair.
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {:<12} {}", key.dimmed(), value);
        } else {
            println!("    {:<12} {}", key, value);
        }
    }

    /// Dimmed tip, set apart by a blank line.
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  hint: {}", message);
        }
    }

    /// A shell command the operator is expected to run next.
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("      {}", cmd.bright_cyan());
        } else {
            println!("      $ {}", cmd);
        }
    }

    /// Final line of a successful command.
    pub fn complete(&self, message: &str) {
        println!("\n{}", self.render(Mark::Done, message));
    }

    /// Blank line.
    pub fn newline(&self) {
        println!();
    }
}
