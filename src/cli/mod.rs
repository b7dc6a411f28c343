use clap::Parser;

pub mod dispatcher;
pub mod handlers;

/// Builds the color-aware full help string at runtime.
fn build_help_string() -> &'static str {
    // Replaces placeholders like `<title>` with styled text.
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let err = if use_colors { "\x1b[91m" } else { "" }; // Bright Red (destructive)
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<err>", err)
        .replace("</err>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// ee: named, versioned environment schemas, projects and config sheets.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// Base directory of the store. Overrides EE_HOME.
    #[arg(long, value_name = "DIR")]
    pub home: Option<String>,

    /// Show debug logs.
    #[arg(long, short)]
    pub verbose: bool,

    /// Answer yes to every confirmation prompt.
    #[arg(long, short)]
    pub yes: bool,

    /// The command and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_before_command() {
        let cli = Cli::try_parse_from([
            "ee", "--home", "/tmp/x", "-y", "sheet", "list", "--standalone",
        ])
        .unwrap();
        assert_eq!(cli.home.as_deref(), Some("/tmp/x"));
        assert!(cli.yes);
        assert!(!cli.verbose);
        assert_eq!(cli.args, vec!["sheet", "list", "--standalone"]);
    }
}
