//! [`AssetSource`] backed by the `PostGIS` asset schema.

use async_trait::async_trait;
use park_assets_boundary::BoundaryGeometry;
use park_assets_database::catalog;
use park_assets_database::queries::{OutsideBoundaryQuery, query_outside_boundary};
use park_assets_models::{ColumnDef, is_computed_column};
use switchy_database::Database;

use crate::{AssetSource, EvaluateError, EvaluateOptions, TableViolations};

/// Reads asset tables from a schema discovered through the catalog.
pub struct PostgisAssetSource<'a> {
    db: &'a dyn Database,
    schema: String,
    geometry_column: String,
    dropped_columns: Vec<String>,
}

impl<'a> PostgisAssetSource<'a> {
    /// Creates a source over `options.schema`.
    #[must_use]
    pub fn new(db: &'a dyn Database, options: &EvaluateOptions) -> Self {
        Self {
            db,
            schema: options.schema.clone(),
            geometry_column: options.geometry_column.clone(),
            dropped_columns: options.dropped_columns.clone(),
        }
    }
}

#[async_trait]
impl AssetSource for PostgisAssetSource<'_> {
    async fn list_tables(&self) -> Result<Vec<String>, EvaluateError> {
        Ok(catalog::list_tables(self.db, &self.schema).await?)
    }

    async fn outside_boundary(
        &self,
        table: &str,
        boundary: &BoundaryGeometry,
    ) -> Result<TableViolations, EvaluateError> {
        let columns = attribute_columns(
            table,
            catalog::table_columns(self.db, &self.schema, table).await?,
            &self.geometry_column,
            &self.dropped_columns,
        );

        let wkb_hex = boundary.wkb_hex();
        let records = query_outside_boundary(
            self.db,
            &OutsideBoundaryQuery {
                schema: &self.schema,
                table,
                geometry_column: &self.geometry_column,
                columns: &columns,
                boundary_wkb_hex: &wkb_hex,
            },
        )
        .await?;

        Ok(TableViolations {
            table: table.to_string(),
            columns,
            records,
        })
    }
}

/// Catalog columns that are read as attributes.
///
/// Dropped columns never leave the database and the geometry column is
/// replaced by the computed coordinates. Columns named like a computed
/// column are skipped.
fn attribute_columns(
    table: &str,
    catalog: Vec<ColumnDef>,
    geometry_column: &str,
    dropped_columns: &[String],
) -> Vec<ColumnDef> {
    catalog
        .into_iter()
        .filter(|c| c.name != geometry_column && !dropped_columns.contains(&c.name))
        .filter(|c| {
            let computed = is_computed_column(&c.name);
            if computed {
                log::warn!(
                    "{table}: skipping column '{}', it is computed by the check",
                    c.name
                );
            }
            !computed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use park_assets_models::ColumnKind;

    use super::*;

    #[test]
    fn keeps_plain_attributes_in_catalog_order() {
        let columns = attribute_columns(
            "benches",
            vec![
                ColumnDef::new("gisid", ColumnKind::Text),
                ColumnDef::new("geom", ColumnKind::Text),
                ColumnDef::new("ogc_fid", ColumnKind::Integer),
                ColumnDef::new("condition", ColumnKind::Real),
            ],
            "geom",
            &["ogc_fid".to_string()],
        );
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["gisid", "condition"]);
    }

    #[test]
    fn skips_columns_named_like_computed_ones() {
        let columns = attribute_columns(
            "benches",
            vec![
                ColumnDef::new("gisid", ColumnKind::Text),
                ColumnDef::new("longitude", ColumnKind::Real),
                ColumnDef::new("latitude", ColumnKind::Real),
                ColumnDef::new("distance_m", ColumnKind::Real),
                ColumnDef::new("source_table", ColumnKind::Text),
            ],
            "geom",
            &[],
        );
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["gisid"]);
    }
}
