//! 資料表查詢條件，最後轉成 PostgREST 的 query string。

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, String),
    Neq(String, String),
    Gt(String, String),
    Gte(String, String),
    Lt(String, String),
    Lte(String, String),
    ILike(String, String),
    In(String, Vec<String>),
    IsNull(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    columns: Option<String>,
    filters: Vec<Filter>,
    order: Vec<(String, SortDirection)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.to_string()));
        self
    }

    pub fn neq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Neq(column.into(), value.to_string()));
        self
    }

    pub fn gt(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Gt(column.into(), value.to_string()));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.to_string()));
        self
    }

    pub fn lt(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Lt(column.into(), value.to_string()));
        self
    }

    pub fn lte(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Lte(column.into(), value.to_string()));
        self
    }

    /// 不分大小寫的部分比對，`*` 為萬用字元
    pub fn ilike(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike(column.into(), pattern.into()));
        self
    }

    pub fn in_list<I, S>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filters.push(Filter::In(column.into(), values));
        self
    }

    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter::IsNull(column.into()));
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// 只保留篩選條件，用在 update / delete
    pub fn filters_only(&self) -> Query {
        Query {
            filters: self.filters.clone(),
            ..Default::default()
        }
    }

    /// 轉成 PostgREST 的 (key, value) 參數，由 HTTP client 負責 URL 編碼
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        if let Some(columns) = &self.columns {
            pairs.push(("select".to_string(), columns.clone()));
        }

        for filter in &self.filters {
            let (column, expr) = match filter {
                Filter::Eq(c, v) => (c, format!("eq.{}", v)),
                Filter::Neq(c, v) => (c, format!("neq.{}", v)),
                Filter::Gt(c, v) => (c, format!("gt.{}", v)),
                Filter::Gte(c, v) => (c, format!("gte.{}", v)),
                Filter::Lt(c, v) => (c, format!("lt.{}", v)),
                Filter::Lte(c, v) => (c, format!("lte.{}", v)),
                Filter::ILike(c, v) => (c, format!("ilike.{}", v)),
                Filter::In(c, values) => {
                    let quoted: Vec<String> = values.iter().map(|v| quote_value(v)).collect();
                    (c, format!("in.({})", quoted.join(",")))
                }
                Filter::IsNull(c) => (c, "is.null".to_string()),
            };
            pairs.push((column.clone(), expr));
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(column, direction)| match direction {
                    SortDirection::Asc => format!("{}.asc", column),
                    SortDirection::Desc => format!("{}.desc", column),
                })
                .collect();
            pairs.push(("order".to_string(), order.join(",")));
        }

        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }

        pairs
    }
}

// PostgREST 的 in.() 列表遇到逗號或括號時需要加雙引號
fn quote_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
