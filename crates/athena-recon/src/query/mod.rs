//! Comparison query generation.
//!
//! [`compile`] turns a [`ComparisonSpec`] and one compare-column subset into
//! the full five-branch comparison query for Athena. Compilation is a pure
//! function of its inputs: the same spec and subset always produce
//! byte-identical text, which is what makes the size measurement in
//! [`bisect`] meaningful.
//!
//! Query shape (Presto SQL):
//!
//! ```text
//! WITH filtered_a AS (...),
//!      filtered_b AS (...),
//!      excluded AS (...),              -- only with adjustment exclusion
//!      duplicate_a AS (...),
//!      duplicate_b AS (...)
//! SELECT ... 'missing in B' ...        -- in A, absent from B, key unique in A
//! UNION ALL ... 'missing in A' ...
//! UNION ALL ... 'duplicate key in A' ...
//! UNION ALL ... 'duplicate key in B' ...
//! UNION ALL ... 'matched' ...          -- keys 1:1, some compared column differs
//! ORDER BY join columns
//! ```
//!
//! Both source tables are filtered exactly once in the WITH block; every
//! branch and both duplicate counts read the filtered CTEs, so duplicate
//! detection runs on the filtered population. Join-key membership tests are
//! correlated EXISTS checks over the join columns rather than tuple IN
//! subqueries, which misbehave on Athena when key columns have mixed types.
//! Value comparison uses IS DISTINCT FROM, so NULL on both sides is equal
//! and NULL on one side is a difference.

pub mod bisect;

use crate::codec::{DIFF_FIELD, ENTRY_SEPARATOR, NULL_LITERAL, PAIR_SEPARATOR};
use crate::core::identifier::{escape_literal, quote};
use crate::core::{
    ColumnSubset, ComparisonSpec, TableRef, REMARKS_FIELD, REMARK_DUPLICATE_IN_A,
    REMARK_DUPLICATE_IN_B, REMARK_MATCHED, REMARK_MISSING_IN_A, REMARK_MISSING_IN_B,
};

/// Compiled query text plus its size.
///
/// Athena's query-length limit is measured in bytes, so `bytes` is the
/// UTF-8 encoded length, not the character count. Multi-byte column names
/// and filter text count at their encoded size.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub text: String,
    pub bytes: usize,
}

impl CompiledQuery {
    fn new(text: String) -> Self {
        let bytes = text.len();
        Self { text, bytes }
    }
}

/// Compile the five-branch comparison query for one compare-column subset.
///
/// The subset restricts only branch 5: which columns are compared and which
/// entries the condensed difference field can carry. Branches 1-4 depend on
/// the join columns alone and are identical across subsets.
pub fn compile(spec: &ComparisonSpec, subset: &ColumnSubset) -> CompiledQuery {
    debug_assert!(!subset.is_empty());

    let join = &spec.join_columns;
    let filter = spec.row_filter.as_deref();

    let mut ctes = vec![
        filtered_cte("filtered_a", &spec.table_a, filter),
        filtered_cte("filtered_b", &spec.table_b, filter),
    ];
    if let Some(adjustment) = &spec.adjustment {
        ctes.push(excluded_cte(&adjustment.table, filter, join));
    }
    ctes.push(duplicate_cte("duplicate_a", "filtered_a", join));
    ctes.push(duplicate_cte("duplicate_b", "filtered_b", join));

    let exclude = spec.adjustment.is_some();

    // Branch 1: in A, no key match in B, key unique in A.
    let mut conditions = vec![
        format!("NOT {}", key_exists("filtered_b", "b", "a", join)),
        format!("NOT {}", key_exists("duplicate_a", "d", "a", join)),
    ];
    if exclude {
        conditions.push(excluded_check("a", join));
    }
    let missing_in_b = branch(
        &key_select("a", join),
        REMARK_MISSING_IN_B,
        "''",
        "filtered_a a",
        &conditions,
    );

    // Branch 2: symmetric, rows only in B.
    let mut conditions = vec![
        format!("NOT {}", key_exists("filtered_a", "a", "b", join)),
        format!("NOT {}", key_exists("duplicate_b", "d", "b", join)),
    ];
    if exclude {
        conditions.push(excluded_check("b", join));
    }
    let missing_in_a = branch(
        &key_select("b", join),
        REMARK_MISSING_IN_A,
        "''",
        "filtered_b b",
        &conditions,
    );

    // Branch 3: every A row whose key is duplicated in A.
    let mut conditions = vec![key_exists("duplicate_a", "d", "a", join)];
    if exclude {
        conditions.push(excluded_check("a", join));
    }
    let duplicate_in_a = branch(
        &key_select("a", join),
        REMARK_DUPLICATE_IN_A,
        "''",
        "filtered_a a",
        &conditions,
    );

    // Branch 4: symmetric for B.
    let mut conditions = vec![key_exists("duplicate_b", "d", "b", join)];
    if exclude {
        conditions.push(excluded_check("b", join));
    }
    let duplicate_in_b = branch(
        &key_select("b", join),
        REMARK_DUPLICATE_IN_B,
        "''",
        "filtered_b b",
        &conditions,
    );

    // Branch 5: keys matched 1:1, at least one subset column differs.
    let matched_from = format!(
        "filtered_a a\nJOIN filtered_b b ON {}",
        key_equality("b", "a", join)
    );
    let mut conditions = vec![
        format!("NOT {}", key_exists("duplicate_a", "d", "a", join)),
        format!("NOT {}", key_exists("duplicate_b", "d", "b", join)),
    ];
    if exclude {
        conditions.push(excluded_check("a", join));
    }
    conditions.push(any_difference(subset.columns()));
    let matched = branch(
        &key_select("a", join),
        REMARK_MATCHED,
        &condensed_diff_expr(subset.columns()),
        &matched_from,
        &conditions,
    );

    let branches = [
        missing_in_b,
        missing_in_a,
        duplicate_in_a,
        duplicate_in_b,
        matched,
    ];
    let order_by = join
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ");

    CompiledQuery::new(format!(
        "WITH {}\n{}\nORDER BY {}",
        ctes.join(",\n"),
        branches.join("\nUNION ALL\n"),
        order_by
    ))
}

/// `name AS (SELECT * FROM table [WHERE filter])`
fn filtered_cte(name: &str, table: &TableRef, filter: Option<&str>) -> String {
    match filter {
        Some(predicate) => format!(
            "{} AS (\n  SELECT * FROM {}\n  WHERE {}\n)",
            name,
            table.qualified(),
            predicate
        ),
        None => format!("{} AS (\n  SELECT * FROM {}\n)", name, table.qualified()),
    }
}

/// Join-key projection of the adjustment table, under the same row filter.
fn excluded_cte(table: &TableRef, filter: Option<&str>, join: &[String]) -> String {
    let columns = quoted_list(join);
    match filter {
        Some(predicate) => format!(
            "excluded AS (\n  SELECT {} FROM {}\n  WHERE {}\n)",
            columns,
            table.qualified(),
            predicate
        ),
        None => format!(
            "excluded AS (\n  SELECT {} FROM {}\n)",
            columns,
            table.qualified()
        ),
    }
}

/// Join keys appearing more than once in the (already filtered) source CTE.
fn duplicate_cte(name: &str, source: &str, join: &[String]) -> String {
    let columns = quoted_list(join);
    format!(
        "{} AS (\n  SELECT {} FROM {} GROUP BY {} HAVING COUNT(*) > 1\n)",
        name, columns, source, columns
    )
}

fn quoted_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `inner."j1" = outer."j1" AND inner."j2" = outer."j2" ...`
fn key_equality(inner: &str, outer: &str, join: &[String]) -> String {
    join.iter()
        .map(|c| {
            let c = quote(c);
            format!("{}.{} = {}.{}", inner, c, outer, c)
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Correlated existence check for the outer row's join key in a CTE.
fn key_exists(cte: &str, inner: &str, outer: &str, join: &[String]) -> String {
    format!(
        "EXISTS (SELECT 1 FROM {} {} WHERE {})",
        cte,
        inner,
        key_equality(inner, outer, join)
    )
}

fn excluded_check(outer: &str, join: &[String]) -> String {
    format!("NOT {}", key_exists("excluded", "e", outer, join))
}

/// `alias."j1" AS "j1", alias."j2" AS "j2" ...`
fn key_select(alias: &str, join: &[String]) -> String {
    join.iter()
        .map(|c| {
            let c = quote(c);
            format!("{}.{} AS {}", alias, c, c)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One conditional entry of the condensed difference field, NULL when the
/// column does not differ.
fn diff_case(column: &str) -> String {
    let ident = quote(column);
    format!(
        "CASE WHEN a.{ident} IS DISTINCT FROM b.{ident} THEN \
         concat('{label}:', COALESCE(CAST(a.{ident} AS VARCHAR), '{null}'), \
         '{pair}', COALESCE(CAST(b.{ident} AS VARCHAR), '{null}')) END",
        ident = ident,
        label = escape_literal(column),
        null = NULL_LITERAL,
        pair = PAIR_SEPARATOR,
    )
}

/// The condensed difference field: differing entries in subset order,
/// semicolon joined, non-differing columns contributing nothing.
fn condensed_diff_expr(columns: &[String]) -> String {
    let cases = columns
        .iter()
        .map(|c| diff_case(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "array_join(filter(ARRAY[{}], x -> x IS NOT NULL), '{}')",
        cases, ENTRY_SEPARATOR
    )
}

/// `(a."c1" IS DISTINCT FROM b."c1" OR ...)`
fn any_difference(columns: &[String]) -> String {
    let predicates = columns
        .iter()
        .map(|c| {
            let c = quote(c);
            format!("a.{} IS DISTINCT FROM b.{}", c, c)
        })
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({})", predicates)
}

fn branch(
    key_select: &str,
    remarks: &str,
    diff_expr: &str,
    from_clause: &str,
    conditions: &[String],
) -> String {
    format!(
        "SELECT {}, '{}' AS {}, {} AS {}\nFROM {}\nWHERE {}",
        key_select,
        remarks,
        quote(REMARKS_FIELD),
        diff_expr,
        quote(DIFF_FIELD),
        from_clause,
        conditions.join("\n  AND ")
    )
}
