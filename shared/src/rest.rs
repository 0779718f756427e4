//! Paths for the hosted row API (`/rest/v1/<table>?select=..&col=eq.value&order=..`).

use std::fmt::Write;

pub const FORUMS: &str = "forums";
pub const FORUM_MESSAGES: &str = "forum_messages";
pub const PROFILES: &str = "profiles";
pub const FORUM_NOTIFICATIONS: &str = "forum_notifications";

/// Embedded author columns for rows carrying an `author_id`.
pub const WITH_AUTHOR: &str = "*,author:profiles(id,full_name,avatar_url)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: &'static str,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<(String, Order)>,
    limit: Option<u32>,
}

impl Query {
    pub fn table(table: &'static str) -> Self {
        Query {
            table,
            select: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_string(), format!("eq.{value}")));
        self
    }

    pub fn order(mut self, column: &str, order: Order) -> Self {
        self.order.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table_name(&self) -> &'static str {
        self.table
    }

    /// Path relative to the backend base URL.
    pub fn to_path(&self) -> String {
        let mut path = format!("/rest/v1/{}", self.table);
        let mut params: Vec<String> = Vec::new();
        if let Some(select) = &self.select {
            params.push(format!("select={}", urlencoding::encode(select)));
        }
        for (column, filter) in &self.filters {
            params.push(format!("{column}={}", urlencoding::encode(filter)));
        }
        if !self.order.is_empty() {
            let mut order = String::new();
            for (i, (column, dir)) in self.order.iter().enumerate() {
                if i > 0 {
                    order.push(',');
                }
                let dir = match dir {
                    Order::Asc => "asc",
                    Order::Desc => "desc",
                };
                let _ = write!(order, "{column}.{dir}");
            }
            params.push(format!("order={order}"));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={limit}"));
        }
        if !params.is_empty() {
            path.push('?');
            path.push_str(&params.join("&"));
        }
        path
    }
}

/// `forums` with authors, most recently active first, pinned on top.
pub fn forums() -> Query {
    Query::table(FORUMS)
        .select(WITH_AUTHOR)
        .order("is_pinned", Order::Desc)
        .order("last_activity", Order::Desc)
}

/// Every message of one forum, oldest first.
pub fn forum_messages(forum_id: &str) -> Query {
    Query::table(FORUM_MESSAGES)
        .select(WITH_AUTHOR)
        .eq("forum_id", forum_id)
        .order("created_at", Order::Asc)
}

pub fn profile(user_id: &str) -> Query {
    Query::table(PROFILES)
        .select("id,full_name,avatar_url")
        .eq("id", user_id)
        .limit(1)
}

pub fn profiles() -> Query {
    Query::table(PROFILES)
        .select("id,full_name,avatar_url")
        .order("full_name", Order::Asc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forum_messages_path() {
        assert_eq!(
            forum_messages("abc-1").to_path(),
            "/rest/v1/forum_messages?select=%2A%2Cauthor%3Aprofiles%28id%2Cfull_name%2Cavatar_url%29\
             &forum_id=eq.abc-1&order=created_at.asc"
        );
    }

    #[test]
    fn filter_values_are_encoded() {
        let path = Query::table(PROFILES).eq("full_name", "Ann & Bo").to_path();
        assert_eq!(path, "/rest/v1/profiles?full_name=eq.Ann%20%26%20Bo");
    }

    #[test]
    fn bare_table_has_no_query_string() {
        assert_eq!(Query::table(FORUMS).to_path(), "/rest/v1/forums");
        assert_eq!(
            Query::table(FORUMS).eq("category", "General").limit(5).to_path(),
            "/rest/v1/forums?category=eq.General&limit=5"
        );
    }
}
