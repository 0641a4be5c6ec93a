//! Paths command - show where fallback files live for an identity

use super::{resolve_identity, resolve_paths};
use crate::cache::CachePaths;
use crate::cli::args::{OutputFormat, PathsArgs};
use crate::config::Config;
use crate::error::KeepsakeResult;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the paths command
pub async fn execute(args: PathsArgs, config: &Config) -> KeepsakeResult<()> {
    let identity = resolve_identity(&args.identity, config)?;
    let paths = resolve_paths(&identity, &args.location, config)?;

    match args.format {
        OutputFormat::Table => print_table(&paths),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&paths)?),
        OutputFormat::Plain => print!("{}", render_plain(&paths)),
    }

    Ok(())
}

fn print_table(paths: &CachePaths) {
    let ctx = UiContext::detect();
    println!("{}", style("Fallback files").bold());
    ui::key_value(&ctx, "Entry", &describe(&paths.entry));
    ui::key_value(&ctx, "Metadata", &describe(&paths.metadata));
}

fn describe(path: &std::path::Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not present)", path.display())
    }
}

fn render_plain(paths: &CachePaths) -> String {
    format!("{}\n{}\n", paths.entry.display(), paths.metadata.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::IdentityKey;
    use std::path::Path;

    #[test]
    fn plain_lists_entry_then_metadata() {
        let identity = IdentityKey::new("tok", Some("backend".into()), Some("dev".into())).unwrap();
        let paths = CachePaths::resolve(Path::new("/cache"), &identity);

        let rendered = render_plain(&paths);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(".enc"));
        assert!(lines[1].ends_with(".meta"));
    }

    #[test]
    fn describe_marks_missing_files() {
        assert!(describe(Path::new("/nonexistent/keepsake.enc")).ends_with("(not present)"));
    }
}
