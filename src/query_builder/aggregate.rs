//! Aggregates, pagination counts and chunked iteration.
//!
//! Aggregates temporarily rewrite the spec (descriptor installed, ordering
//! and limits cleared for pagination counts). The rewrites are held by drop
//! guards so the original state comes back on every exit path, including a
//! failed execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    bindings::{BindingCategory, CategoryBindings},
    spec::{Aggregate, AggregateFunction, Order, SelectItem},
    Builder, Result,
};
use crate::connection::Row;

/// Restores the column selection and clears the aggregate descriptor on drop.
struct AggregateScope<'a> {
    builder: &'a mut Builder,
    previous_columns: Option<Vec<SelectItem>>,
}

impl<'a> AggregateScope<'a> {
    fn install(
        builder: &'a mut Builder,
        function: AggregateFunction,
        columns: &[&str],
        percentile: Option<f64>,
    ) -> Self {
        let previous_columns = builder.spec.columns.clone();
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        if builder.spec.columns.is_none() {
            builder.spec.columns = Some(columns.iter().cloned().map(SelectItem::Column).collect());
        }
        builder.spec.aggregate = Some(Aggregate {
            label: builder.spec.from.clone(),
            function,
            columns,
            percentile,
        });
        AggregateScope {
            builder,
            previous_columns,
        }
    }
}

impl Drop for AggregateScope<'_> {
    fn drop(&mut self) {
        self.builder.spec.columns = self.previous_columns.take();
        self.builder.spec.aggregate = None;
    }
}

/// State cleared while counting rows for pagination.
struct PaginationBackup {
    orders: Vec<Order>,
    limit: Option<u64>,
    offset: Option<u64>,
    columns: Option<Vec<SelectItem>>,
    order_bindings: CategoryBindings,
    select_bindings: CategoryBindings,
}

struct PaginationScope<'a> {
    builder: &'a mut Builder,
    backup: Option<PaginationBackup>,
}

impl<'a> PaginationScope<'a> {
    fn enter(builder: &'a mut Builder) -> Self {
        let spec = &mut builder.spec;
        let backup = PaginationBackup {
            orders: std::mem::take(&mut spec.orders),
            limit: spec.limit.take(),
            offset: spec.offset.take(),
            columns: spec.columns.take(),
            order_bindings: spec.bindings.take(BindingCategory::Order),
            select_bindings: spec.bindings.take(BindingCategory::Select),
        };
        PaginationScope {
            builder,
            backup: Some(backup),
        }
    }
}

impl Drop for PaginationScope<'_> {
    fn drop(&mut self) {
        if let Some(backup) = self.backup.take() {
            let spec = &mut self.builder.spec;
            spec.orders = backup.orders;
            spec.limit = backup.limit;
            spec.offset = backup.offset;
            spec.columns = backup.columns;
            spec.bindings.set(BindingCategory::Order, backup.order_bindings);
            spec.bindings.set(BindingCategory::Select, backup.select_bindings);
        }
    }
}

/// First value of the first row; lists collapse to their first element.
fn extract_scalar(rows: Vec<Row>) -> Value {
    let Some(row) = rows.into_iter().next() else {
        return Value::Null;
    };
    match row.into_iter().next() {
        Some((_, Value::Array(items))) => items.into_iter().next().unwrap_or(Value::Null),
        Some((_, value)) => value,
        None => Value::Null,
    }
}

fn as_count(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_i64().map(|i| i.max(0) as u64))
        .or_else(|| value.as_f64().map(|f| f.max(0.0) as u64))
        .unwrap_or(0)
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Row>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimplePage {
    pub items: Vec<Row>,
    pub per_page: u64,
    pub current_page: u64,
    pub has_more: bool,
}

impl Builder {
    /// Runs the query with `function` applied in place of the projection and
    /// returns the scalar result.
    pub fn aggregate(
        &mut self,
        function: AggregateFunction,
        columns: &[&str],
        percentile: Option<f64>,
    ) -> Result<Value> {
        let rows = {
            let scope = AggregateScope::install(self, function, columns, percentile);
            scope.builder.get()?
        };
        Ok(extract_scalar(rows))
    }

    pub fn count(&mut self) -> Result<u64> {
        let value = self.aggregate(AggregateFunction::Count, &["*"], None)?;
        Ok(as_count(&value))
    }

    pub fn count_distinct(&mut self, columns: &[&str]) -> Result<u64> {
        let value = self.aggregate(AggregateFunction::CountDistinct, columns, None)?;
        Ok(as_count(&value))
    }

    pub fn min(&mut self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::Min, &[column], None)
    }

    pub fn max(&mut self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::Max, &[column], None)
    }

    pub fn sum(&mut self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::Sum, &[column], None)
    }

    pub fn avg(&mut self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::Avg, &[column], None)
    }

    pub fn average(&mut self, column: &str) -> Result<Value> {
        self.avg(column)
    }

    /// Collected list of the column's values.
    pub fn collect(&mut self, column: &str) -> Result<Value> {
        let rows = {
            let scope = AggregateScope::install(self, AggregateFunction::Collect, &[column], None);
            scope.builder.get()?
        };
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, value)| value))
            .unwrap_or(Value::Array(Vec::new())))
    }

    pub fn percentile_cont(&mut self, column: &str, percentile: f64) -> Result<Value> {
        self.aggregate(AggregateFunction::PercentileCont, &[column], Some(percentile))
    }

    pub fn percentile_disc(&mut self, column: &str, percentile: f64) -> Result<Value> {
        self.aggregate(AggregateFunction::PercentileDisc, &[column], Some(percentile))
    }

    pub fn stdev(&mut self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::StDev, &[column], None)
    }

    pub fn stdevp(&mut self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::StDevP, &[column], None)
    }

    /// Total number of matching rows, ignoring ordering, limit and offset.
    ///
    /// Grouped queries yield one row per group; the number of groups is
    /// returned in that case.
    pub fn count_for_pagination(&mut self) -> Result<u64> {
        let mut scope = PaginationScope::enter(self);
        let grouped = !scope.builder.spec.groups.is_empty();
        let rows = {
            let aggregate =
                AggregateScope::install(&mut *scope.builder, AggregateFunction::Count, &["*"], None);
            aggregate.builder.get()?
        };
        if grouped {
            return Ok(rows.len() as u64);
        }
        Ok(as_count(&extract_scalar(rows)))
    }

    /// Feeds the results to `callback` one page at a time, starting at page 1.
    ///
    /// Stops on the first empty page or when the callback returns `false`;
    /// the return value tells whether every page was processed.
    pub fn chunk(&self, size: u64, mut callback: impl FnMut(Vec<Row>, u64) -> bool) -> Result<bool> {
        let mut page = 1;
        loop {
            let rows = self.clone().for_page(page, size).get()?;
            if rows.is_empty() {
                return Ok(true);
            }
            log::debug!("chunk page {} ({} row(s))", page, rows.len());
            if !callback(rows, page) {
                return Ok(false);
            }
            page += 1;
        }
    }

    /// Length-aware pagination. `per_page` falls back to the configured
    /// default.
    pub fn paginate(&self, per_page: Option<u64>, page: u64) -> Result<Page> {
        let per_page = per_page.unwrap_or(u64::from(self.config.per_page)).max(1);
        let page = page.max(1);
        let total = self.clone().count_for_pagination()?;
        let items = if total > 0 {
            self.clone().for_page(page, per_page).get()?
        } else {
            Vec::new()
        };
        Ok(Page {
            items,
            total,
            per_page,
            current_page: page,
            last_page: total.div_ceil(per_page).max(1),
        })
    }

    /// Pagination without a count query; fetches one extra row to detect a
    /// following page.
    pub fn simple_paginate(&self, per_page: Option<u64>, page: u64) -> Result<SimplePage> {
        let per_page = per_page.unwrap_or(u64::from(self.config.per_page)).max(1);
        let page = page.max(1);
        let mut items = self
            .clone()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page.saturating_add(1))
            .get()?;
        let has_more = items.len() as u64 > per_page;
        items.truncate(usize::try_from(per_page).unwrap_or(usize::MAX));
        Ok(SimplePage {
            items,
            per_page,
            current_page: page,
            has_more,
        })
    }
}
