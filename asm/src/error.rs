use color_print::cprintln;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown operation: `{0}`")]
    UnknownOperation(String),

    #[error("Unknown directive: `{0}`")]
    UnknownDirective(String),

    #[error("More argument required for `{0}`")]
    MissingArgument(String),

    #[error("Unexpected argument `{1}` for `{0}`")]
    UnexpectedArgument(String, String),

    #[error("Cannot parse `{0}` as {1}")]
    ParseArgument(String, String),

    #[error("Bad register: `{0}` (expected R0..R31, SP, FP)")]
    BadRegister(String),

    #[error("Undefined label: `{0}`")]
    UndefinedLabel(String),

    #[error("Re-defined label: `{0}` (first defined on line {1})")]
    RedefinedLabel(String, usize),

    #[error("Address overflow: no room for a word at {0:#010X}")]
    AddressOverflow(u32),

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("immediate `{0}` truncated to {1} bits")]
    Truncated(i64, u32),
}

/// An error or warning attached to a 0-based source line.
#[derive(Debug)]
pub struct Diag<T> {
    pub line: usize,
    pub item: T,
}

impl<T> Diag<T> {
    pub fn new(line: usize, item: T) -> Self {
        Diag { line, item }
    }
}

fn print_location(file: &str, lines: &[String], line_idx: usize) {
    // line_idx is 0-based, display as 1-based
    let line_num = line_idx + 1;
    cprintln!("     <blue>--></> <underline>{}:{}</>", file, line_num);
    cprintln!("      <blue>|</>");
    let line_content = lines.get(line_idx).map(|s| s.as_str()).unwrap_or("");
    cprintln!(" <blue>{:>4} |</> {}", line_num, line_content);
    cprintln!("      <blue>|</>");
}

impl Diag<Error> {
    /// Print error with the file location and line content
    pub fn print(&self, file: &str, lines: &[String]) {
        cprintln!("<red,bold>error</>: {}", self.item);
        print_location(file, lines, self.line);
    }
}

impl Diag<Warning> {
    pub fn print(&self, file: &str, lines: &[String]) {
        cprintln!("<yellow,bold>warning</>: {}", self.item);
        print_location(file, lines, self.line);
    }
}
