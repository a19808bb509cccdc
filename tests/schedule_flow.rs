mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::NaiveDate;
use diesel::prelude::*;
use serde_json::json;
use spendsync::schema::workspace_schedules;
use spendsync::spend::SourceExpense;

use common::{acquire_db_lock, body_json, TestApp};

fn source_expense(id: &str, fund_source: &str) -> SourceExpense {
    SourceExpense {
        id: id.to_string(),
        employee_email: "ada@example.com".to_string(),
        category: Some("Travel".to_string()),
        project: None,
        cost_center: None,
        report_id: "rp1".to_string(),
        fund_source: fund_source.to_string(),
        reimbursable: fund_source == "PERSONAL",
        state: "PAYMENT_PROCESSING".to_string(),
        amount: 75.0,
        currency: "USD".to_string(),
        spent_at: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(9, 0, 0),
        updated_at: NaiveDate::from_ymd_opt(2024, 2, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
    }
}

#[tokio::test]
async fn enabling_a_schedule_registers_one_remote_job() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app.seed_workspace(Some("BILL"), None).await?;
    let response = app
        .post_json(
            &format!("/api/workspaces/{workspace_id}/schedule/"),
            &json!({
                "enabled": true,
                "interval_hours": 6,
                "next_run": "2024-03-05T10:30:00.000Z",
                "user": "ops@example.com"
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let schedule = body_json(response.into_body()).await?;
    assert_eq!(schedule["enabled"], true);
    assert_eq!(schedule["interval_hours"], 6);
    assert_eq!(schedule["remote_job_id"], "job-1");

    assert_eq!(app.scheduler.created_count(), 1);
    let job = app.scheduler.last_created().expect("job registered");
    assert_eq!(
        job.callback_url,
        format!("http://sync.test/api/workspaces/{workspace_id}/schedule/trigger/")
    );
    assert_eq!(job.callback_method, "POST");
    assert_eq!(job.start_datetime, "2024-03-05 10:30:00.00");
    assert_eq!(job.hours, 6);
    assert!(job.description.contains("ops@example.com"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn disabling_a_schedule_deletes_the_remote_job() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app.seed_workspace(Some("BILL"), None).await?;
    let enable = json!({
        "enabled": true,
        "interval_hours": 6,
        "next_run": "2024-03-05T10:30:00.000Z"
    });
    let response = app
        .post_json(&format!("/api/workspaces/{workspace_id}/schedule/"), &enable)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let disable = json!({
        "enabled": false,
        "interval_hours": 6,
        "next_run": "2024-03-05T10:30:00.000Z"
    });
    let response = app
        .post_json(&format!("/api/workspaces/{workspace_id}/schedule/"), &disable)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let schedule = body_json(response.into_body()).await?;
    assert_eq!(schedule["enabled"], false);
    assert!(schedule["remote_job_id"].is_null());

    assert_eq!(app.scheduler.deleted_jobs(), vec!["job-1".to_string()]);
    assert_eq!(app.scheduler.created_count(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn re_enabling_replaces_the_remote_job() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app.seed_workspace(Some("BILL"), None).await?;
    let payload = json!({
        "enabled": true,
        "interval_hours": 6,
        "next_run": "2024-03-05T10:30:00.000Z"
    });
    for _ in 0..2 {
        let response = app
            .post_json(&format!("/api/workspaces/{workspace_id}/schedule/"), &payload)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.scheduler.deleted_jobs(), vec!["job-1".to_string()]);
    assert_eq!(app.scheduler.created_count(), 2);

    let stored: Option<String> = app
        .with_conn(move |conn| {
            Ok(workspace_schedules::table
                .filter(workspace_schedules::workspace_id.eq(workspace_id))
                .select(workspace_schedules::remote_job_id)
                .first(conn)?)
        })
        .await?;
    assert_eq!(stored.as_deref(), Some("job-2"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_schedule_updates_never_orphan_a_remote_job() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app.seed_workspace(Some("BILL"), None).await?;
    let app = std::sync::Arc::new(app);
    let payload = json!({
        "enabled": true,
        "interval_hours": 6,
        "next_run": "2024-03-05T10:30:00.000Z"
    });

    let first = tokio::spawn({
        let app = app.clone();
        let payload = payload.clone();
        async move {
            app.post_json(&format!("/api/workspaces/{workspace_id}/schedule/"), &payload)
                .await
        }
    });
    let second = tokio::spawn({
        let app = app.clone();
        let payload = payload.clone();
        async move {
            app.post_json(&format!("/api/workspaces/{workspace_id}/schedule/"), &payload)
                .await
        }
    });
    assert_eq!(first.await??.status(), StatusCode::OK);
    assert_eq!(second.await??.status(), StatusCode::OK);

    let stored: Option<String> = app
        .with_conn(move |conn| {
            Ok(workspace_schedules::table
                .filter(workspace_schedules::workspace_id.eq(workspace_id))
                .select(workspace_schedules::remote_job_id)
                .first(conn)?)
        })
        .await?;
    let stored = stored.expect("a remote job id is stored");

    // Every job ever registered is either the stored one or was deleted.
    let created = app.scheduler.created_job_ids();
    let deleted = app.scheduler.deleted_jobs();
    assert!(created.contains(&stored));
    assert!(!deleted.contains(&stored));
    let orphans: Vec<&String> = created
        .iter()
        .filter(|id| **id != stored && !deleted.contains(id))
        .collect();
    assert!(orphans.is_empty(), "orphaned remote jobs: {orphans:?}");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn malformed_schedule_timestamp_makes_no_changes() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app.seed_workspace(Some("BILL"), None).await?;
    let response = app
        .post_json(
            &format!("/api/workspaces/{workspace_id}/schedule/"),
            &json!({
                "enabled": true,
                "interval_hours": 6,
                "next_run": "next tuesday"
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await?;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("malformed schedule timestamp"));

    assert_eq!(app.scheduler.created_count(), 0);
    assert!(app.scheduler.deleted_jobs().is_empty());

    let rows: i64 = app
        .with_conn(move |conn| {
            Ok(workspace_schedules::table
                .filter(workspace_schedules::workspace_id.eq(workspace_id))
                .count()
                .first(conn)?)
        })
        .await?;
    assert_eq!(rows, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn scheduler_outage_surfaces_but_keeps_the_schedule_row() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app.seed_workspace(Some("BILL"), None).await?;
    app.scheduler.state.lock().unwrap().fail_trigger = true;

    let response = app
        .post_json(
            &format!("/api/workspaces/{workspace_id}/schedule/"),
            &json!({
                "enabled": true,
                "interval_hours": 6,
                "next_run": "2024-03-05T10:30:00.000Z"
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The local row survives without a job id; the next successful update
    // will register one.
    let stored: Option<Option<String>> = app
        .with_conn(move |conn| {
            Ok(workspace_schedules::table
                .filter(workspace_schedules::workspace_id.eq(workspace_id))
                .select(workspace_schedules::remote_job_id)
                .first(conn)
                .optional()?)
        })
        .await?;
    assert_eq!(stored, Some(None));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn triggered_sync_routes_each_fund_source_to_its_document_type() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app
        .seed_workspace(Some("BILL"), Some("CREDIT CARD PURCHASE"))
        .await?;
    app.spend.set_expenses(vec![
        source_expense("tx1", "PERSONAL"),
        source_expense("tx2", "CCC"),
    ]);

    let response = app
        .post_json(
            &format!("/api/workspaces/{workspace_id}/schedule/trigger"),
            &json!({ "user": "ops@example.com" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let log = body_json(response.into_body()).await?;
    assert_eq!(log["task_type"], "FETCHING_EXPENSES");
    assert_eq!(log["status"], "COMPLETE");
    assert_eq!(log["detail"]["expenses_fetched"], 2);
    assert_eq!(log["detail"]["groups_created"], 2);

    let response = app
        .get(&format!("/api/workspaces/{workspace_id}/bills"))
        .await?;
    let bills = body_json(response.into_body()).await?;
    assert_eq!(bills.as_array().expect("bill list").len(), 1);
    assert_eq!(bills[0]["total_amount"], 75.0);

    let response = app
        .get(&format!("/api/workspaces/{workspace_id}/credit_card_purchases"))
        .await?;
    let purchases = body_json(response.into_body()).await?;
    assert_eq!(purchases.as_array().expect("purchase list").len(), 1);

    // Re-running the schedule must not post the same groups twice.
    let response = app
        .post_json(
            &format!("/api/workspaces/{workspace_id}/schedule/trigger"),
            &json!({}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app
        .get(&format!("/api/workspaces/{workspace_id}/bills"))
        .await?;
    let bills = body_json(response.into_body()).await?;
    assert_eq!(bills.as_array().expect("bill list").len(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn corporate_card_only_workspace_still_fetches_and_posts() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app.seed_workspace(None, Some("JOURNAL ENTRY")).await?;
    app.spend.set_expenses(vec![
        source_expense("tx1", "PERSONAL"),
        source_expense("tx2", "CCC"),
    ]);

    let response = app
        .post_json(
            &format!("/api/workspaces/{workspace_id}/schedule/trigger"),
            &json!({}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let log = body_json(response.into_body()).await?;
    assert_eq!(log["status"], "COMPLETE");
    assert_eq!(log["detail"]["expenses_fetched"], 2);

    let query = app.spend.last_expense_query().expect("fetch issued");
    let sources: Vec<&str> = query.fund_sources.iter().map(|s| s.as_str()).collect();
    assert_eq!(sources, vec!["PERSONAL", "CCC"]);

    let response = app
        .get(&format!("/api/workspaces/{workspace_id}/journal_entries"))
        .await?;
    let entries = body_json(response.into_body()).await?;
    assert_eq!(entries.as_array().expect("entry list").len(), 1);

    let response = app
        .get(&format!("/api/workspaces/{workspace_id}/bills"))
        .await?;
    let bills = body_json(response.into_body()).await?;
    assert!(bills.as_array().expect("bill list").is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unconfigured_workspace_run_ends_failed_not_in_progress() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let workspace_id = app.seed_workspace(None, None).await?;
    let response = app
        .post_json(
            &format!("/api/workspaces/{workspace_id}/schedule/trigger"),
            &json!({}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let log = body_json(response.into_body()).await?;
    assert_eq!(log["status"], "FAILED");
    assert!(log["detail"]["error"]
        .as_str()
        .unwrap()
        .contains("no accounting document types configured"));
    assert_eq!(app.spend.expense_query_count(), 0);

    app.cleanup().await?;
    Ok(())
}
