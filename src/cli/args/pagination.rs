//! Page selection for list commands backed by DRF pagination

use clap::Args;

/// Shared paging arguments.
///
/// ```ignore
/// List {
///     #[command(flatten)]
///     page: PageArgs,
/// }
/// ```
#[derive(Args, Debug, Default, Clone)]
pub struct PageArgs {
    /// Page number (1-indexed, as the server counts)
    #[arg(long, short = 'p')]
    pub page: Option<u32>,

    /// Maximum rows to display from the page
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

impl PageArgs {
    /// Apply the display limit
    pub fn take<T>(&self, items: Vec<T>) -> Vec<T> {
        match self.limit {
            Some(limit) => items.into_iter().take(limit).collect(),
            None => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_applies_limit() {
        let args = PageArgs {
            page: None,
            limit: Some(2),
        };
        assert_eq!(args.take(vec![1, 2, 3]), vec![1, 2]);
        assert_eq!(PageArgs::default().take(vec![1, 2, 3]), vec![1, 2, 3]);
    }
}
