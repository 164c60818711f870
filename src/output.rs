//! Terminal output for the fxq tool

use fxq::ValidationError;
use fxq::presearch::PreSearchData;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print a validation verdict, green for valid and red for invalid
pub fn print_validation(
    kind: &str,
    result: &Result<(), ValidationError>,
    color: bool,
) -> io::Result<()> {
    let mut stdout = stdout(color);

    match result {
        Ok(()) => {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
            write!(stdout, "valid")?;
            stdout.reset()?;
            writeln!(stdout, " {} query", kind)?;
        }
        Err(err) => {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            write!(stdout, "invalid")?;
            stdout.reset()?;
            writeln!(stdout, " {} query: {}", kind, err)?;
        }
    }

    Ok(())
}

/// Print one line per KNN candidate, best score first
pub fn print_presearch(data: &PreSearchData, color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);
    let mut hits: Vec<_> = data.knn_hits().iter().collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));

    writeln!(stdout, "{} knn candidates", hits.len())?;
    for hit in hits {
        if !hit.index.is_empty() {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(stdout, "{}", hit.index)?;
            stdout.reset()?;
            write!(stdout, ":")?;
        }
        write!(stdout, "{}", hit.id)?;

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(stdout, " {:.4}", hit.score)?;
        stdout.reset()?;
    }

    Ok(())
}
