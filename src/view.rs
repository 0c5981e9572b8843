use std::cmp::Ordering;

use crate::dataset::{Column, Dataset, Record};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortState {
    #[default]
    Unsorted,
    Ascending,
    Descending,
}

impl SortState {
    /// Unsorted -> Ascending -> Descending -> Unsorted
    pub fn next(self) -> SortState {
        match self {
            SortState::Unsorted => SortState::Ascending,
            SortState::Ascending => SortState::Descending,
            SortState::Descending => SortState::Unsorted,
        }
    }

    pub fn indicator(self) -> &'static str {
        match self { SortState::Unsorted => "", SortState::Ascending => " ⬆️", SortState::Descending => " ⬇️" }
    }
}

/// Filter and sort over a loaded dataset. Never touches the dataset itself.
/// Both work on the raw field of each displayed column, as the generated page does.
pub struct TableView<'a> {
    dataset: &'a Dataset,
    columns: &'a [Column],
    filter: String,
    sort: Option<(usize, SortState)>,
}

impl<'a> TableView<'a> {
    pub fn new(dataset: &'a Dataset, columns: &'a [Column]) -> Self {
        Self { dataset, columns, filter: String::new(), sort: None }
    }

    fn raw<'r>(r: &'r Record, c: &Column) -> &'r str {
        r.get(&c.name).unwrap_or("")
    }

    pub fn columns(&self) -> &'a [Column] { self.columns }

    pub fn set_filter(&mut self, query: &str) { self.filter = query.to_lowercase(); }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Advances the sort cycle of `column`; any other sorted column is reset.
    pub fn toggle_sort(&mut self, column: usize) {
        let next = self.sort_state(column).next();
        self.set_sort(column, next);
    }

    pub fn set_sort(&mut self, column: usize, state: SortState) {
        self.sort = if column < self.columns.len() && state != SortState::Unsorted { Some((column, state)) } else { None };
    }

    pub fn sort_state(&self, column: usize) -> SortState {
        match self.sort { Some((c, s)) if c == column => s, _ => SortState::Unsorted }
    }

    fn matches(&self, r: &Record) -> bool {
        self.filter.is_empty() || self.columns.iter().any(|c| Self::raw(r, c).to_lowercase().contains(&self.filter))
    }

    pub fn rows(&self) -> Vec<&'a Record> {
        let mut out: Vec<&'a Record> = self.dataset.records.iter().filter(|r| self.matches(r)).collect();
        if let Some((idx, state)) = self.sort {
            let col = &self.columns[idx];
            let mut keyed: Vec<(&'a str, &'a Record)> = out.into_iter().map(|r| (Self::raw(r, col), r)).collect();
            keyed.sort_by(|(a, _), (b, _)| {
                let o = natural_cmp(a, b);
                if state == SortState::Descending { o.reverse() } else { o }
            });
            out = keyed.into_iter().map(|(_, r)| r).collect();
        }
        out
    }
}

/// Case-insensitive comparison that orders digit runs by numeric value ("item 2" < "item 10").
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let da = take_digits(&mut ai);
                let db = take_digits(&mut bi);
                let (ta, tb) = (da.trim_start_matches('0'), db.trim_start_matches('0'));
                let o = ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb)).then_with(|| da.len().cmp(&db.len()));
                if o != Ordering::Equal { return o; }
            }
            (Some(x), Some(y)) => {
                if x != y { return x.cmp(&y); }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut s = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() { break; }
        s.push(c);
        it.next();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ViewOptions, build};

    fn sample() -> (Dataset, Vec<Column>) {
        let text = "Timestamp,Name,Role,Years\n\
                    2024-01-01,alice,Backend,10\n\
                    2024-01-02,Bob,Frontend,2\n\
                    2024-01-03,carol,backend dev,9\n";
        build(text, &ViewOptions { filter_stale_rows: false, ..Default::default() }, chrono::Utc::now())
    }

    fn names(rows: &[&Record]) -> Vec<String> {
        rows.iter().map(|r| r.get("Name").unwrap_or("").to_string()).collect()
    }

    #[test]
    fn unfiltered_view_keeps_dataset_order() {
        let (ds, cols) = sample();
        let v = TableView::new(&ds, &cols);
        assert_eq!(names(&v.rows()), ["carol", "Bob", "alice"]);
    }

    #[test]
    fn filter_is_case_insensitive_across_columns() {
        let (ds, cols) = sample();
        let mut v = TableView::new(&ds, &cols);
        v.set_filter("BACKEND");
        assert_eq!(names(&v.rows()), ["carol", "alice"]);
        v.set_filter("bob");
        assert_eq!(names(&v.rows()), ["Bob"]);
        v.set_filter("nobody");
        assert!(v.rows().is_empty());
        v.set_filter("");
        assert_eq!(v.rows().len(), 3);
    }

    #[test]
    fn filter_ignores_hidden_timestamp() {
        let (ds, cols) = sample();
        let mut v = TableView::new(&ds, &cols);
        v.set_filter("2024-01-02");
        assert!(v.rows().is_empty());
    }

    #[test]
    fn sort_cycles_through_three_states() {
        let (ds, cols) = sample();
        let mut v = TableView::new(&ds, &cols);
        let name = v.column_index("name").unwrap();
        v.toggle_sort(name);
        assert_eq!(v.sort_state(name), SortState::Ascending);
        assert_eq!(names(&v.rows()), ["alice", "Bob", "carol"]);
        v.toggle_sort(name);
        assert_eq!(v.sort_state(name), SortState::Descending);
        assert_eq!(names(&v.rows()), ["carol", "Bob", "alice"]);
        v.toggle_sort(name);
        assert_eq!(v.sort_state(name), SortState::Unsorted);
        assert_eq!(names(&v.rows()), ["carol", "Bob", "alice"]);
        assert_eq!(ds.records[0].get("Name"), Some("carol"));
    }

    #[test]
    fn switching_column_restarts_cycle() {
        let (ds, cols) = sample();
        let mut v = TableView::new(&ds, &cols);
        v.toggle_sort(0);
        v.toggle_sort(0);
        v.toggle_sort(2);
        assert_eq!(v.sort_state(0), SortState::Unsorted);
        assert_eq!(v.sort_state(2), SortState::Ascending);
        assert_eq!(names(&v.rows()), ["Bob", "carol", "alice"]);
    }

    #[test]
    fn filter_and_sort_use_raw_fields() {
        let text = "Timestamp,Name,Profile Link\n\
                    2024-01-01,<i>Dana</i>,http://b.test\n\
                    2024-01-02,Erin,javascript:alert(1)\n";
        let (ds, cols) = build(text, &ViewOptions { filter_stale_rows: false, ..Default::default() }, chrono::Utc::now());
        let mut v = TableView::new(&ds, &cols);
        v.set_filter("<i>");
        assert_eq!(names(&v.rows()), ["<i>Dana</i>"]);
        v.set_filter("javascript");
        assert_eq!(names(&v.rows()), ["Erin"]);
        v.set_filter("");
        let link = v.column_index("profile link").unwrap();
        v.toggle_sort(link);
        assert_eq!(names(&v.rows()), ["<i>Dana</i>", "Erin"]);
        v.toggle_sort(link);
        assert_eq!(names(&v.rows()), ["Erin", "<i>Dana</i>"]);
    }

    #[test]
    fn natural_order_for_numbers() {
        assert_eq!(natural_cmp("2", "10"), Ordering::Less);
        assert_eq!(natural_cmp("item 10", "item 9"), Ordering::Greater);
        assert_eq!(natural_cmp("Alice", "alice"), Ordering::Equal);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Greater);
    }

    #[test]
    fn indicators() {
        assert_eq!(SortState::Unsorted.indicator(), "");
        assert_eq!(SortState::Ascending.indicator(), " ⬆️");
        assert_eq!(SortState::Descending.indicator(), " ⬇️");
    }
}
