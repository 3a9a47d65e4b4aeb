use crate::models::{AnalysisWindow, NormalizedAccess, SnapshotWindow};
use std::io::{self, BufRead, Write};

// Windowed sub-selection: always returns a new table, the input is left untouched
pub fn filter_accesses(table: &[NormalizedAccess], window: &AnalysisWindow) -> Vec<NormalizedAccess> {
    if !window.is_active() {
        return table.to_vec();
    }

    table
        .iter()
        .filter(|a| window.includes_rank(a.rank) && window.includes_interval(a.start, a.end))
        .cloned()
        .collect()
}

// Operator window plus, for chunked traces, the snapshot owning each access
pub fn filter_partition(
    table: &[NormalizedAccess],
    window: &AnalysisWindow,
    snapshot: Option<&SnapshotWindow>,
) -> Vec<NormalizedAccess> {
    let Some(snapshot) = snapshot else {
        return filter_accesses(table, window);
    };

    table
        .iter()
        .filter(|a| {
            snapshot.contains_start(a.start)
                && window.includes_rank(a.rank)
                && window.includes_interval(a.start, a.end)
        })
        .cloned()
        .collect()
}

fn read_value<R: BufRead, T: std::str::FromStr>(input: &mut R, prompt: &str) -> io::Result<Option<T>> {
    println!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(line.parse::<T>().ok())
}

// Ask the operator for window bounds; an empty answer leaves the bound open
pub fn read_window_options<R: BufRead>(input: &mut R) -> io::Result<AnalysisWindow> {
    Ok(AnalysisWindow {
        start: read_value(input, "start time (s, empty to skip): ")?,
        end: read_value(input, "end time (s, empty to skip): ")?,
        from_rank: read_value(input, "from rank (empty to skip): ")?,
        to_rank: read_value(input, "to rank (empty to skip): ")?,
    })
}

pub fn prompt_yes_no<R: BufRead>(input: &mut R, question: &str) -> io::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
