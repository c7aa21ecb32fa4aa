//! Searchable, filterable, sortable and paginated view over artifacts

use std::cmp::Ordering;

use serde_json::Value;

use crate::artifact::Artifact;

/// Rows-per-page choices offered by the table
pub const ROWS_PER_PAGE_OPTIONS: [usize; 5] = [5, 15, 30, 50, 100];

/// Table columns in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Table,
    Name,
    Types,
    Nullable,
    PrimaryKey,
    RowCount,
    Description,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::Table,
        Column::Name,
        Column::Types,
        Column::Nullable,
        Column::PrimaryKey,
        Column::RowCount,
        Column::Description,
    ];

    /// Key used in export headers
    pub fn key(&self) -> &'static str {
        match self {
            Column::Table => "table",
            Column::Name => "name",
            Column::Types => "types",
            Column::Nullable => "nullable",
            Column::PrimaryKey => "primary_key",
            Column::RowCount => "row_count",
            Column::Description => "description",
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            Column::Table => "Table/Collection",
            Column::Name => "Column Name",
            Column::Types => "Type(s)",
            Column::Nullable => "Nullable",
            Column::PrimaryKey => "PK",
            Column::RowCount => "Row Count",
            Column::Description => "Description",
        }
    }

    fn present_in(&self, artifact: &Artifact) -> bool {
        match self {
            Column::Table | Column::Name => true,
            Column::Types => artifact.types.is_some(),
            Column::Nullable => artifact.nullable.is_some(),
            Column::PrimaryKey => artifact.primary_key.is_some(),
            Column::RowCount => artifact.row_count.is_some(),
            Column::Description => artifact.description.is_some(),
        }
    }
}

/// One cell of the table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    List(Vec<String>),
    Flag(bool),
    Count(u64),
}

impl Cell {
    pub fn of(artifact: &Artifact, column: Column) -> Self {
        match column {
            Column::Table => Cell::Text(artifact.table.clone()),
            Column::Name => Cell::Text(artifact.name.clone()),
            Column::Types => artifact.types.clone().map_or(Cell::Empty, Cell::List),
            Column::Nullable => artifact.nullable.map_or(Cell::Empty, Cell::Flag),
            Column::PrimaryKey => artifact.primary_key.map_or(Cell::Empty, Cell::Flag),
            Column::RowCount => artifact.row_count.map_or(Cell::Empty, Cell::Count),
            Column::Description => artifact.description.clone().map_or(Cell::Empty, Cell::Text),
        }
    }

    /// Flat text form; lists are joined with `", "`
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.clone(),
            Cell::List(items) => items.join(", "),
            Cell::Flag(flag) => flag.to_string(),
            Cell::Count(count) => count.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Text(text) => Value::String(text.clone()),
            Cell::List(items) => Value::from(items.clone()),
            Cell::Flag(flag) => Value::Bool(*flag),
            Cell::Count(count) => Value::from(*count),
        }
    }

    fn compare(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Count(a), Cell::Count(b)) => a.cmp(b),
            _ => compare_ignore_case(&self.display(), &other.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Table state: data plus every user-adjustable view setting
#[derive(Debug, Clone)]
pub struct ResultTable {
    label: String,
    rows: Vec<Artifact>,
    available: Vec<Column>,
    visible: Vec<Column>,
    search: String,
    nullable_only: bool,
    primary_key_only: bool,
    sort_column: Column,
    sort_direction: SortDirection,
    rows_per_page: usize,
    page: usize,
}

impl ResultTable {
    pub fn new(label: impl Into<String>, rows: Vec<Artifact>) -> Self {
        let mut table = Self {
            label: label.into(),
            rows: Vec::new(),
            available: Vec::new(),
            visible: Vec::new(),
            search: String::new(),
            nullable_only: false,
            primary_key_only: false,
            sort_column: Column::Name,
            sort_direction: SortDirection::Ascending,
            rows_per_page: ROWS_PER_PAGE_OPTIONS[0],
            page: 1,
        };
        table.load(rows);
        table
    }

    /// Replace the data; visible columns reset to everything available
    pub fn load(&mut self, rows: Vec<Artifact>) {
        self.available = Column::ALL
            .into_iter()
            .filter(|column| rows.iter().any(|row| column.present_in(row)))
            .collect();
        self.visible = self.available.clone();
        self.rows = rows;
        self.page = 1;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Heading shown above the table and in the PDF export
    pub fn title(&self) -> String {
        format!("Scan Result: {}", self.label)
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn available_columns(&self) -> &[Column] {
        &self.available
    }

    /// Visible columns, always in canonical order
    pub fn visible_columns(&self) -> &[Column] {
        &self.visible
    }

    pub fn is_visible(&self, column: Column) -> bool {
        self.visible.contains(&column)
    }

    /// Show or hide one available column. The last visible column stays.
    pub fn toggle_column(&mut self, column: Column) {
        if !self.available.contains(&column) {
            return;
        }
        if let Some(pos) = self.visible.iter().position(|c| *c == column) {
            if self.visible.len() > 1 {
                self.visible.remove(pos);
            }
        } else {
            self.visible.push(column);
            self.visible.sort();
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.page = 1;
    }

    pub fn nullable_only(&self) -> bool {
        self.nullable_only
    }

    pub fn set_nullable_only(&mut self, enabled: bool) {
        self.nullable_only = enabled;
        self.page = 1;
    }

    pub fn primary_key_only(&self) -> bool {
        self.primary_key_only
    }

    pub fn set_primary_key_only(&mut self, enabled: bool) {
        self.primary_key_only = enabled;
        self.page = 1;
    }

    pub fn sort(&self) -> (Column, SortDirection) {
        (self.sort_column, self.sort_direction)
    }

    /// Selecting the active column flips direction; another column sorts ascending
    pub fn toggle_sort(&mut self, column: Column) {
        if self.sort_column == column {
            self.sort_direction = self.sort_direction.flipped();
        } else {
            self.sort_column = column;
            self.sort_direction = SortDirection::Ascending;
        }
    }

    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    /// Change the page size; values outside the offered options are ignored
    pub fn set_rows_per_page(&mut self, rows_per_page: usize) {
        if ROWS_PER_PAGE_OPTIONS.contains(&rows_per_page) {
            self.rows_per_page = rows_per_page;
            self.page = 1;
        }
    }

    /// Current page, 1-based
    pub fn page(&self) -> usize {
        self.page.min(self.page_count())
    }

    /// At least one page, even for an empty table
    pub fn page_count(&self) -> usize {
        self.filtered_len().div_ceil(self.rows_per_page).max(1)
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.page_count());
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page() + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page().saturating_sub(1));
    }

    fn matches(&self, row: &Artifact) -> bool {
        let needle = self.search.to_lowercase();
        row.name.to_lowercase().contains(&needle)
            && (!self.nullable_only || row.nullable == Some(true))
            && (!self.primary_key_only || row.primary_key == Some(true))
    }

    fn filtered_len(&self) -> usize {
        self.rows.iter().filter(|row| self.matches(row)).count()
    }

    fn compare(&self, a: &Artifact, b: &Artifact) -> Ordering {
        let ordering = compare_ignore_case(&a.table, &b.table)
            .then_with(|| compare_ignore_case(&a.name, &b.name))
            .then_with(|| {
                Cell::of(a, self.sort_column).compare(&Cell::of(b, self.sort_column))
            });
        self.sort_direction.apply(ordering)
    }

    /// Every row that passes the filters, in sort order
    pub fn view_rows(&self) -> Vec<&Artifact> {
        let mut rows: Vec<&Artifact> = self.rows.iter().filter(|row| self.matches(row)).collect();
        rows.sort_by(|a, b| self.compare(a, b));
        rows
    }

    /// The slice of [`Self::view_rows`] on the current page
    pub fn page_rows(&self) -> Vec<&Artifact> {
        let start = (self.page() - 1) * self.rows_per_page;
        self.view_rows()
            .into_iter()
            .skip(start)
            .take(self.rows_per_page)
            .collect()
    }

    /// "Showing a–b of n rows"
    pub fn summary(&self) -> String {
        let total = self.filtered_len();
        if total == 0 {
            return "Showing 0–0 of 0 rows".to_string();
        }
        let start = (self.page() - 1) * self.rows_per_page + 1;
        let end = (start + self.rows_per_page - 1).min(total);
        format!("Showing {}–{} of {} rows", start, end, total)
    }

    /// Visible cells of every filtered, sorted row
    pub fn visible_cells(&self) -> Vec<Vec<Cell>> {
        self.view_rows()
            .into_iter()
            .map(|row| self.visible.iter().map(|column| Cell::of(row, *column)).collect())
            .collect()
    }
}
