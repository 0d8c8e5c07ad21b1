use std::collections::HashMap;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::errors::StoreError;
use crate::models::user::User;
use crate::schema::{dashboard_slices, dashboard_user, dashboards, slice_user, slices, users};

/// A chart definition, a view on a datasource.
#[derive(Debug, Serialize, Deserialize, Queryable, Clone, PartialEq, Eq)]
#[diesel(table_name = slices)]
pub struct Slice {
    pub id: i32,
    pub slice_name: Option<String>,
    pub datasource_id: Option<i32>,
    pub datasource_type: Option<String>,
    pub datasource_name: Option<String>,
    pub viz_type: Option<String>,
    pub params: Option<String>,
    pub description: Option<String>,
    pub cache_timeout: Option<i32>,
}

#[derive(Debug, Default, Serialize, Deserialize, Insertable)]
#[diesel(table_name = slices)]
pub struct NewSlice {
    pub slice_name: Option<String>,
    pub datasource_id: Option<i32>,
    pub datasource_type: Option<String>,
    pub datasource_name: Option<String>,
    pub viz_type: Option<String>,
    pub params: Option<String>,
    pub description: Option<String>,
    pub cache_timeout: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Queryable, Clone, PartialEq, Eq)]
#[diesel(table_name = dashboards)]
pub struct Dashboard {
    pub id: i32,
    pub dashboard_title: Option<String>,
    pub position_json: Option<String>,
    pub description: Option<String>,
    pub css: Option<String>,
    pub json_metadata: Option<String>,
    pub slug: Option<String>,
    pub published: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Insertable)]
#[diesel(table_name = dashboards)]
pub struct NewDashboard {
    pub dashboard_title: Option<String>,
    pub position_json: Option<String>,
    pub description: Option<String>,
    pub css: Option<String>,
    pub json_metadata: Option<String>,
    pub slug: Option<String>,
    pub published: bool,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = dashboard_slices)]
pub struct NewDashboardSlice {
    pub dashboard_id: i32,
    pub slice_id: i32,
}

/// The on-disk export document: a list of dashboards, each carrying its
/// slices. Origin ids travel as `remote_id` inside the JSON params so a
/// later import can match rows from an earlier import of the same source.
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardExport {
    pub dashboards: Vec<DashboardBundle>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardBundle {
    pub dashboard_title: Option<String>,
    pub position_json: Option<String>,
    pub json_metadata: Option<String>,
    pub description: Option<String>,
    pub css: Option<String>,
    pub slug: Option<String>,
    pub slices: Vec<SliceBundle>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SliceBundle {
    pub slice_name: Option<String>,
    pub datasource_type: Option<String>,
    pub datasource_name: Option<String>,
    pub viz_type: Option<String>,
    pub params: Option<String>,
    pub cache_timeout: Option<i32>,
}

/// Parse an optional JSON text column into an object, treating missing or
/// blank values as an empty object.
fn json_object(raw: Option<&str>) -> Result<Map<String, Value>, StoreError> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => {
            let value: Value = serde_json::from_str(raw)?;
            match value {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::MalformedJson(format!(
                    "Expected a JSON object, got: {}",
                    other
                ))),
            }
        }
        _ => Ok(Map::new()),
    }
}

/// Rewrite `meta.chartId` references in a position layout from old slice
/// ids to the ids the slices received on import. Nodes without a chartId,
/// and chart ids absent from the map, are left untouched.
pub fn alter_positions(position: &mut Value, old_to_new: &HashMap<i64, i64>) {
    let Some(nodes) = position.as_object_mut() else {
        return;
    };
    for node in nodes.values_mut() {
        let Some(chart_id) = node.pointer("/meta/chartId").and_then(Value::as_i64) else {
            continue;
        };
        if let Some(new_id) = old_to_new.get(&chart_id) {
            node["meta"]["chartId"] = json!(*new_id);
        }
    }
}

impl NewSlice {
    pub fn save(&self, conn: &mut PgConnection) -> Result<Slice, StoreError> {
        Ok(diesel::insert_into(slices::table)
            .values(self)
            .get_result(conn)?)
    }
}

impl Slice {
    pub fn params_dict(&self) -> Result<Map<String, Value>, StoreError> {
        json_object(self.params.as_deref())
    }

    pub fn alter_params(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut params = self.params_dict()?;
        params.insert(key.to_string(), value);
        self.params = Some(serde_json::to_string(&Value::Object(params))?);
        Ok(())
    }

    pub fn owners(&self, conn: &mut PgConnection) -> Result<Vec<User>, StoreError> {
        Ok(slice_user::table
            .inner_join(users::table)
            .filter(slice_user::slice_id.eq(self.id))
            .select(users::all_columns)
            .load::<User>(conn)?)
    }
}

impl NewDashboard {
    pub fn save(&self, conn: &mut PgConnection) -> Result<Dashboard, StoreError> {
        Ok(diesel::insert_into(dashboards::table)
            .values(self)
            .get_result(conn)?)
    }
}

impl Dashboard {
    pub fn get(conn: &mut PgConnection, dashboard_id: i32) -> Result<Dashboard, StoreError> {
        Ok(dashboards::table
            .filter(dashboards::id.eq(dashboard_id))
            .first::<Dashboard>(conn)?)
    }

    /// The metadata blob doubles as the params object of a dashboard.
    pub fn params_dict(&self) -> Result<Map<String, Value>, StoreError> {
        json_object(self.json_metadata.as_deref())
    }

    pub fn alter_params(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut params = self.params_dict()?;
        params.insert(key.to_string(), value);
        self.json_metadata = Some(serde_json::to_string(&Value::Object(params))?);
        Ok(())
    }

    pub fn slices(&self, conn: &mut PgConnection) -> Result<Vec<Slice>, StoreError> {
        Ok(dashboard_slices::table
            .inner_join(slices::table)
            .filter(dashboard_slices::dashboard_id.eq(self.id))
            .order(slices::id)
            .select(slices::all_columns)
            .load::<Slice>(conn)?)
    }

    pub fn owners(&self, conn: &mut PgConnection) -> Result<Vec<User>, StoreError> {
        Ok(dashboard_user::table
            .inner_join(users::table)
            .filter(dashboard_user::dashboard_id.eq(self.id))
            .select(users::all_columns)
            .load::<User>(conn)?)
    }

    /// Attach a slice to this dashboard. Attaching twice is a no-op.
    pub fn add_slice(&self, conn: &mut PgConnection, slice: &Slice) -> Result<(), StoreError> {
        diesel::insert_into(dashboard_slices::table)
            .values(NewDashboardSlice {
                dashboard_id: self.id,
                slice_id: slice.id,
            })
            .on_conflict((dashboard_slices::dashboard_id, dashboard_slices::slice_id))
            .do_nothing()
            .execute(conn)?;
        Ok(())
    }

    /// Serialize the given dashboards, with their slices, into a JSON
    /// document suitable for importing into another instance. Each row is
    /// tagged with its origin id as `remote_id`.
    pub fn export_dashboards(
        conn: &mut PgConnection,
        dashboard_ids: &[i32],
    ) -> Result<String, StoreError> {
        let mut bundles = Vec::new();
        for &dashboard_id in dashboard_ids {
            let dashboard = Dashboard::get(conn, dashboard_id)?;
            let mut slice_bundles = Vec::new();
            for slice in dashboard.slices(conn)? {
                let mut params = slice.params_dict()?;
                params.insert("remote_id".to_string(), json!(slice.id));
                if let Some(name) = &slice.datasource_name {
                    params.insert("datasource_name".to_string(), json!(name));
                }
                slice_bundles.push(SliceBundle {
                    slice_name: slice.slice_name.clone(),
                    datasource_type: slice.datasource_type.clone(),
                    datasource_name: slice.datasource_name.clone(),
                    viz_type: slice.viz_type.clone(),
                    params: Some(serde_json::to_string(&Value::Object(params))?),
                    cache_timeout: slice.cache_timeout,
                });
            }

            let mut metadata = dashboard.params_dict()?;
            metadata.insert("remote_id".to_string(), json!(dashboard.id));
            bundles.push(DashboardBundle {
                dashboard_title: dashboard.dashboard_title.clone(),
                position_json: dashboard.position_json.clone(),
                json_metadata: Some(serde_json::to_string(&Value::Object(metadata))?),
                description: dashboard.description.clone(),
                css: dashboard.css.clone(),
                slug: dashboard.slug.clone(),
                slices: slice_bundles,
            });
        }

        Ok(serde_json::to_string_pretty(&DashboardExport {
            dashboards: bundles,
        })?)
    }

    /// Insert or override a dashboard from an export bundle.
    ///
    /// Slices are matched against earlier imports through the `remote_id`
    /// stored in their params; the dashboard itself through the `remote_id`
    /// in its metadata. Chart references inside the position layout are
    /// rewritten to the ids the slices received here. Ownership is not
    /// carried over. Returns the id of the imported dashboard.
    pub fn import_dashboard(
        conn: &mut PgConnection,
        bundle: &DashboardBundle,
        import_time: Option<i64>,
    ) -> Result<i32, StoreError> {
        info!(
            message = "Importing dashboard",
            title = ?bundle.dashboard_title,
            slice_count = bundle.slices.len(),
        );

        let mut remote_slice_ids: HashMap<i64, i32> = HashMap::new();
        for slice in slices::table.load::<Slice>(conn)? {
            let params = slice.params_dict()?;
            if let Some(remote_id) = params.get("remote_id").and_then(Value::as_i64) {
                remote_slice_ids.insert(remote_id, slice.id);
            }
        }

        let mut old_to_new: HashMap<i64, i64> = HashMap::new();
        let mut new_slice_ids = Vec::new();
        for slice_bundle in &bundle.slices {
            let mut params = json_object(slice_bundle.params.as_deref())?;
            let remote_id = params.get("remote_id").and_then(Value::as_i64);
            if let Some(time) = import_time {
                params.insert("import_time".to_string(), json!(time));
            }
            let params_raw = Some(serde_json::to_string(&Value::Object(params))?);

            let new_id = match remote_id.and_then(|rid| remote_slice_ids.get(&rid).copied()) {
                Some(existing_id) => {
                    diesel::update(slices::table.filter(slices::id.eq(existing_id)))
                        .set((
                            slices::slice_name.eq(slice_bundle.slice_name.clone()),
                            slices::datasource_type.eq(slice_bundle.datasource_type.clone()),
                            slices::datasource_name.eq(slice_bundle.datasource_name.clone()),
                            slices::viz_type.eq(slice_bundle.viz_type.clone()),
                            slices::params.eq(params_raw.clone()),
                            slices::cache_timeout.eq(slice_bundle.cache_timeout),
                        ))
                        .execute(conn)?;
                    existing_id
                }
                None => {
                    // Datasource wiring is resolved by the hosting
                    // application, not here.
                    let slice = NewSlice {
                        slice_name: slice_bundle.slice_name.clone(),
                        datasource_id: None,
                        datasource_type: slice_bundle.datasource_type.clone(),
                        datasource_name: slice_bundle.datasource_name.clone(),
                        viz_type: slice_bundle.viz_type.clone(),
                        params: params_raw.clone(),
                        description: None,
                        cache_timeout: slice_bundle.cache_timeout,
                    }
                    .save(conn)?;
                    slice.id
                }
            };

            if let Some(rid) = remote_id {
                old_to_new.insert(rid, i64::from(new_id));
            }
            new_slice_ids.push(new_id);
        }

        let position_json = match bundle.position_json.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let mut position: Value = serde_json::from_str(raw)?;
                alter_positions(&mut position, &old_to_new);
                Some(serde_json::to_string(&position)?)
            }
            _ => bundle.position_json.clone(),
        };

        let mut metadata = json_object(bundle.json_metadata.as_deref())?;
        let remote_id = metadata.get("remote_id").and_then(Value::as_i64);
        if let Some(time) = import_time {
            metadata.insert("import_time".to_string(), json!(time));
        }
        let metadata_raw = Some(serde_json::to_string(&Value::Object(metadata))?);

        let mut existing = None;
        if let Some(rid) = remote_id {
            for dashboard in dashboards::table.load::<Dashboard>(conn)? {
                if dashboard.params_dict()?.get("remote_id").and_then(Value::as_i64) == Some(rid) {
                    existing = Some(dashboard);
                    break;
                }
            }
        }

        let dashboard_id = match existing {
            Some(dashboard) => {
                diesel::update(dashboards::table.filter(dashboards::id.eq(dashboard.id)))
                    .set((
                        dashboards::dashboard_title.eq(bundle.dashboard_title.clone()),
                        dashboards::position_json.eq(position_json.clone()),
                        dashboards::description.eq(bundle.description.clone()),
                        dashboards::css.eq(bundle.css.clone()),
                        dashboards::json_metadata.eq(metadata_raw.clone()),
                        dashboards::slug.eq(bundle.slug.clone()),
                    ))
                    .execute(conn)?;
                diesel::delete(
                    dashboard_slices::table
                        .filter(dashboard_slices::dashboard_id.eq(dashboard.id)),
                )
                .execute(conn)?;
                dashboard.id
            }
            None => {
                let dashboard = NewDashboard {
                    dashboard_title: bundle.dashboard_title.clone(),
                    position_json,
                    description: bundle.description.clone(),
                    css: bundle.css.clone(),
                    json_metadata: metadata_raw,
                    slug: bundle.slug.clone(),
                    published: false,
                }
                .save(conn)?;
                dashboard.id
            }
        };

        for slice_id in new_slice_ids {
            diesel::insert_into(dashboard_slices::table)
                .values(NewDashboardSlice {
                    dashboard_id,
                    slice_id,
                })
                .on_conflict((dashboard_slices::dashboard_id, dashboard_slices::slice_id))
                .do_nothing()
                .execute(conn)?;
        }

        Ok(dashboard_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alter_positions_rewrites_known_chart_ids() {
        let mut position = json!({
            "DASHBOARD_VERSION_KEY": "v2",
            "GRID_ID": {
                "type": "GRID",
                "id": "GRID_ID",
                "children": ["CHART-1"]
            },
            "CHART-1": {
                "type": "CHART",
                "id": "CHART-1",
                "meta": { "width": 4, "height": 50, "chartId": 118 }
            },
            "CHART-2": {
                "type": "CHART",
                "id": "CHART-2",
                "meta": { "width": 4, "height": 50, "chartId": 999 }
            }
        });

        let old_to_new = HashMap::from([(118, 7)]);
        alter_positions(&mut position, &old_to_new);

        assert_eq!(position["CHART-1"]["meta"]["chartId"], json!(7));
        // Unmapped ids and non-chart nodes stay as they were.
        assert_eq!(position["CHART-2"]["meta"]["chartId"], json!(999));
        assert_eq!(position["DASHBOARD_VERSION_KEY"], json!("v2"));
    }

    #[test]
    fn json_object_treats_blank_as_empty() {
        assert!(json_object(None).unwrap().is_empty());
        assert!(json_object(Some("")).unwrap().is_empty());
        assert!(json_object(Some("  ")).unwrap().is_empty());

        let map = json_object(Some(r#"{"remote_id": 3}"#)).unwrap();
        assert_eq!(map.get("remote_id").and_then(Value::as_i64), Some(3));
    }

    #[test]
    fn json_object_rejects_non_objects() {
        assert!(json_object(Some("[1, 2]")).is_err());
        assert!(json_object(Some("not json")).is_err());
    }

    #[test]
    fn alter_params_round_trips_through_params() {
        let mut slice = Slice {
            id: 1,
            slice_name: Some("Trends".to_string()),
            datasource_id: None,
            datasource_type: None,
            datasource_name: None,
            viz_type: Some("line".to_string()),
            params: Some(r#"{"metric": "count"}"#.to_string()),
            description: None,
            cache_timeout: None,
        };

        slice.alter_params("remote_id", json!(42)).unwrap();
        let params = slice.params_dict().unwrap();
        assert_eq!(params.get("metric").and_then(Value::as_str), Some("count"));
        assert_eq!(params.get("remote_id").and_then(Value::as_i64), Some(42));
    }
}
