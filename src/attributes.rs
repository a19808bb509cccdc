use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::models::NewExpenseAttribute;
use crate::schema::expense_attributes;
use crate::spend::SpendPlatform;

pub const ATTRIBUTE_EMPLOYEE: &str = "EMPLOYEE";
pub const ATTRIBUTE_CATEGORY: &str = "CATEGORY";
pub const ATTRIBUTE_COST_CENTER: &str = "COST_CENTER";
pub const ATTRIBUTE_PROJECT: &str = "PROJECT";

/// One normalized reference entity from the source platform, ready to upsert.
#[derive(Debug, Clone)]
pub struct AttributeUpsert {
    pub attribute_type: &'static str,
    pub display_name: &'static str,
    pub value: String,
    pub source_id: String,
}

pub async fn sync_employees(
    spend: &dyn SpendPlatform,
    conn: &mut PgConnection,
    workspace_id: Uuid,
) -> SyncResult<usize> {
    let employees = spend.list_employees().await?;
    let rows = employees
        .into_iter()
        .map(|employee| AttributeUpsert {
            attribute_type: ATTRIBUTE_EMPLOYEE,
            display_name: "Employee",
            value: employee.employee_email,
            source_id: employee.id,
        })
        .collect::<Vec<_>>();
    Ok(bulk_upsert_attributes(conn, workspace_id, &rows)?)
}

pub async fn sync_categories(
    spend: &dyn SpendPlatform,
    conn: &mut PgConnection,
    workspace_id: Uuid,
    active_only: bool,
) -> SyncResult<usize> {
    let categories = spend.list_categories(active_only).await?;
    let rows = categories
        .into_iter()
        .map(|category| AttributeUpsert {
            attribute_type: ATTRIBUTE_CATEGORY,
            display_name: "Category",
            value: category_value(&category.name, &category.sub_category),
            source_id: category.id,
        })
        .collect::<Vec<_>>();
    Ok(bulk_upsert_attributes(conn, workspace_id, &rows)?)
}

pub async fn sync_cost_centers(
    spend: &dyn SpendPlatform,
    conn: &mut PgConnection,
    workspace_id: Uuid,
    active_only: bool,
) -> SyncResult<usize> {
    let cost_centers = spend.list_cost_centers(active_only).await?;
    let rows = cost_centers
        .into_iter()
        .map(|cost_center| AttributeUpsert {
            attribute_type: ATTRIBUTE_COST_CENTER,
            display_name: "Cost Center",
            value: cost_center.name,
            source_id: cost_center.id,
        })
        .collect::<Vec<_>>();
    Ok(bulk_upsert_attributes(conn, workspace_id, &rows)?)
}

pub async fn sync_projects(
    spend: &dyn SpendPlatform,
    conn: &mut PgConnection,
    workspace_id: Uuid,
    active_only: bool,
) -> SyncResult<usize> {
    let projects = spend.list_projects(active_only).await?;
    let rows = projects
        .into_iter()
        .map(|project| AttributeUpsert {
            attribute_type: ATTRIBUTE_PROJECT,
            display_name: "Project",
            value: project.name,
            source_id: project.id,
        })
        .collect::<Vec<_>>();
    Ok(bulk_upsert_attributes(conn, workspace_id, &rows)?)
}

/// Categories carry their sub-category in the value when the two differ.
fn category_value(name: &str, sub_category: &str) -> String {
    if name == sub_category {
        name.to_string()
    } else {
        format!("{name} / {sub_category}")
    }
}

/// Upserts attributes keyed on `(workspace_id, attribute_type, value)`.
/// Repeating the same input any number of times leaves exactly one row per
/// key; display name and source id follow the latest input.
pub fn bulk_upsert_attributes(
    conn: &mut PgConnection,
    workspace_id: Uuid,
    rows: &[AttributeUpsert],
) -> QueryResult<usize> {
    let now = Utc::now().naive_utc();
    let mut written = 0;
    for row in rows {
        let new_attribute = NewExpenseAttribute {
            id: Uuid::new_v4(),
            workspace_id,
            attribute_type: row.attribute_type.to_string(),
            display_name: row.display_name.to_string(),
            value: row.value.clone(),
            source_id: row.source_id.clone(),
        };
        written += diesel::insert_into(expense_attributes::table)
            .values(&new_attribute)
            .on_conflict((
                expense_attributes::workspace_id,
                expense_attributes::attribute_type,
                expense_attributes::value,
            ))
            .do_update()
            .set((
                expense_attributes::display_name.eq(&new_attribute.display_name),
                expense_attributes::source_id.eq(&new_attribute.source_id),
                expense_attributes::updated_at.eq(now),
            ))
            .execute(conn)?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::category_value;

    #[test]
    fn joins_category_and_sub_category_when_they_differ() {
        assert_eq!(category_value("Travel", "Flights"), "Travel / Flights");
    }

    #[test]
    fn keeps_plain_name_when_sub_category_matches() {
        assert_eq!(category_value("Travel", "Travel"), "Travel");
    }
}
