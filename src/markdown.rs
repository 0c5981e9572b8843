use crate::board::Board;

pub fn render_markdown(board: &Board, title: &str) -> String {
    let mut s = String::new();
    s.push_str(&format!("# {}\n\n", title));
    s.push_str(&format!("Source: {}\n\n", board.source().link_target()));
    let Some(loaded) = board.loaded() else { s.push_str("No data\n"); return s; };
    if loaded.columns.is_empty() { s.push_str("No data\n"); return s; }
    let header: Vec<String> = loaded.columns.iter().map(|c| c.name.replace('|', "\\|")).collect();
    s.push_str(&format!("| {} |\n", header.join(" | ")));
    s.push_str(&format!("|{}\n", "---|".repeat(header.len())));
    for r in &loaded.dataset.records {
        let cells: Vec<String> = loaded.columns.iter().map(|c| board.render(c, r).to_markdown()).collect();
        s.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    s.push_str(&format!("\n{} rows\n", loaded.dataset.len()));
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ViewOptions;
    use crate::source::Source;

    #[test]
    fn table_with_link_cells() {
        let b = Board::new(Source::parse("https://x.test/a.csv"), ViewOptions { filter_stale_rows: false, ..Default::default() });
        b.load_text("Timestamp,Name,Profile Link\n2024-01-01,Alice,http://x.test\n2024-01-02,Bob,javascript:alert(1)\n", chrono::Utc::now());
        let md = render_markdown(&b, "Candidates");
        assert!(md.starts_with("# Candidates\n"));
        assert!(md.contains("| Name | Profile Link |\n|---|---|\n| Bob |  |\n| Alice | [Go by link](http://x.test) |\n"));
        assert!(md.ends_with("\n2 rows\n"));
    }

    #[test]
    fn empty_board() {
        let b = Board::new(Source::parse("https://x.test/a.csv"), ViewOptions::default());
        assert!(render_markdown(&b, "T").ends_with("No data\n"));
    }
}
