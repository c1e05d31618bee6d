use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use settle_core::{CrossSection, Panel, SettleError, StackedRow, XsFilter, merge};

use crate::calendar::previous_weekday;
use crate::core::SettlementBook;
use crate::download::DownloadMode;

/// Several settlement books keyed by market name.
///
/// Operations taking a `markets` argument apply to the named books only, or
/// to every book when it is `None`. Unknown names are ignored.
#[derive(Default)]
pub struct Markets {
    books: BTreeMap<String, SettlementBook>,
}

impl Markets {
    /// No books.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a book, replacing any book of the same market.
    #[must_use]
    pub fn with_book(mut self, book: SettlementBook) -> Self {
        self.insert(book);
        self
    }

    /// Add a book, returning the one it replaced.
    pub fn insert(&mut self, book: SettlementBook) -> Option<SettlementBook> {
        self.books.insert(book.name().to_string(), book)
    }

    /// Book of `market`.
    #[must_use]
    pub fn book(&self, market: &str) -> Option<&SettlementBook> {
        self.books.get(market)
    }

    /// Mutable book of `market`.
    pub fn book_mut(&mut self, market: &str) -> Option<&mut SettlementBook> {
        self.books.get_mut(market)
    }

    /// Market names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.books.keys().map(String::as_str)
    }

    fn selected<'a>(
        &'a self,
        markets: Option<&'a [&'a str]>,
    ) -> impl Iterator<Item = (&'a String, &'a SettlementBook)> + 'a {
        self.books
            .iter()
            .filter(move |(name, _)| markets.is_none_or(|m| m.contains(&name.as_str())))
    }

    fn selected_mut<'a>(
        &'a mut self,
        markets: Option<&'a [&'a str]>,
    ) -> impl Iterator<Item = (&'a String, &'a mut SettlementBook)> + 'a {
        self.books
            .iter_mut()
            .filter(move |(name, _)| markets.is_none_or(|m| m.contains(&name.as_str())))
    }

    /// Load the selected books from their stores.
    ///
    /// # Errors
    /// Stops at the first failing book.
    pub async fn load(&mut self, markets: Option<&[&str]>) -> Result<(), SettleError> {
        for (_, book) in self.selected_mut(markets) {
            book.load().await?;
        }
        Ok(())
    }

    /// Download the selected books one after another.
    ///
    /// Returns the number of downloaded days per market.
    ///
    /// # Errors
    /// Stops at the first failing book; earlier books keep what they stored.
    pub async fn download(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        mode: &DownloadMode,
        markets: Option<&[&str]>,
    ) -> Result<BTreeMap<String, usize>, SettleError> {
        let mut out = BTreeMap::new();
        for (name, book) in self.selected_mut(markets) {
            let days = book.download(start, end, mode.clone()).await?;
            out.insert(name.clone(), days);
        }
        Ok(out)
    }

    /// Bring every book up to the previous weekday.
    ///
    /// # Errors
    /// See [`Markets::download`].
    pub async fn download_until_yesterday(&mut self) -> Result<BTreeMap<String, usize>, SettleError> {
        let yesterday = previous_weekday(Utc::now().date_naive());
        self.download(None, Some(yesterday), &DownloadMode::Missing, None)
            .await
    }

    /// Recompute continuous prices of the selected books with `roll_offset`.
    ///
    /// Returns the number of columns written per market.
    ///
    /// # Errors
    /// Stops at the first failing book.
    pub async fn roll_expiration(
        &mut self,
        roll_offset: usize,
        markets: Option<&[&str]>,
    ) -> Result<BTreeMap<String, usize>, SettleError> {
        let mut out = BTreeMap::new();
        for (name, book) in self.selected_mut(markets) {
            let options = book.continuous_options().roll_offset(roll_offset);
            out.insert(name.clone(), book.roll_expiration(&options).await?);
        }
        Ok(out)
    }

    /// Last stored date per selected market.
    ///
    /// # Errors
    /// Propagates store errors.
    pub async fn last_dates(
        &mut self,
        markets: Option<&[&str]>,
    ) -> Result<BTreeMap<String, Option<NaiveDate>>, SettleError> {
        let mut out = BTreeMap::new();
        for (name, book) in self.selected_mut(markets) {
            out.insert(name.clone(), book.last_date().await?);
        }
        Ok(out)
    }

    /// Delete all stored data of the selected markets.
    ///
    /// Returns per market whether anything was deleted.
    ///
    /// # Errors
    /// Propagates store errors.
    pub async fn delete_data(
        &mut self,
        markets: Option<&[&str]>,
    ) -> Result<BTreeMap<String, bool>, SettleError> {
        let mut out = BTreeMap::new();
        for (name, book) in self.selected_mut(markets) {
            out.insert(name.clone(), book.delete_all_data().await?);
        }
        Ok(out)
    }

    /// Cross-section over every market selected by `filter.market`.
    ///
    /// Markets whose data lacks a requested key are skipped; the others'
    /// columns are joined on the union of their dates.
    ///
    /// # Errors
    /// - `FilterKeyNotFound` if no market contains the requested keys (the
    ///   error of the last market tried), or if no market matches `filter.market`.
    /// - Any other error of a market's query, `InvalidArg` for a book never loaded.
    pub fn settle_xs(&self, filter: &XsFilter) -> Result<CrossSection, SettleError> {
        let mut combined: Option<CrossSection> = None;
        let mut last_err: Option<SettleError> = None;
        for (name, book) in &self.books {
            if filter.market.as_ref().is_some_and(|s| !s.matches(name)) {
                continue;
            }
            match book.settle_xs(filter) {
                Ok(xs) => {
                    combined = Some(match combined {
                        Some(acc) => acc.combine(xs)?,
                        None => xs,
                    });
                }
                Err(e @ SettleError::FilterKeyNotFound { .. }) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(market = %name, error = %e, "market skipped in cross-section");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        match (combined, last_err) {
            (Some(xs), _) => Ok(xs),
            (None, Some(e)) => Err(e),
            (None, None) => Err(SettleError::filter_key_not_found(
                "market",
                filter
                    .market
                    .as_ref()
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_default(),
                self.books.keys().cloned().collect(),
                Vec::new(),
            )),
        }
    }

    /// Panels of the selected markets since `since`, joined into one.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidPanel)` if two markets hold the same
    /// column with different kinds.
    pub fn data(&self, since: Option<NaiveDate>, markets: Option<&[&str]>) -> Result<Panel, SettleError> {
        let mut out = Panel::new();
        for (_, book) in self.selected(markets) {
            out = merge(&out, &book.panel().slice(since, None))?;
        }
        Ok(out)
    }

    /// Long form of [`Markets::data`]: one row per date and contract with a maturity.
    ///
    /// # Errors
    /// See [`Markets::data`].
    pub fn data_stack(
        &self,
        since: Option<NaiveDate>,
        markets: Option<&[&str]>,
    ) -> Result<Vec<StackedRow>, SettleError> {
        Ok(self.data(since, markets)?.stack())
    }
}
