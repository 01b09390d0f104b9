//! CLI command definitions and argument parsing.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

/// Tagline with ANSI styling for clap help output.
/// Bold "critic", dimmed rest.
pub const ABOUT_STYLED: &str =
    "\x1b[1mcritic\x1b[0m \x1b[2m· AI review comments for pull requests. Advises, never blocks.\x1b[0m";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn about_mentions_app_name() {
        assert!(ABOUT_STYLED.contains(critic::constants::APP_NAME));
    }
}
