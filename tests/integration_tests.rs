use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use sales_commission_engine::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Default)]
struct RecordingSink {
    received: Vec<GoalThresholdCrossed>,
}

impl NotificationSink for RecordingSink {
    fn deliver(&mut self, signal: &GoalThresholdCrossed) -> sales_commission_engine::Result<()> {
        self.received.push(signal.clone());
        Ok(())
    }
}

/// A small store with two teams, three payment methods and August goals.
fn retail_store() -> Result<(SalesStore, Vec<CollaboratorId>)> {
    let mut store = SalesStore::new(EngineConfig::default(), date(2025, 8, 25));

    let north = store.add_team("North")?;
    let south = store.add_team("South")?;

    let mut sellers = Vec::new();
    for (name, team) in [("Marina", north), ("Rafael", north), ("Joana", south)] {
        sellers.push(store.add_collaborator(NewCollaborator {
            name: name.to_string(),
            role: CollaboratorRole::Seller,
            team_id: Some(team),
        })?);
    }
    store.add_collaborator(NewCollaborator {
        name: "Paula".to_string(),
        role: CollaboratorRole::Admin,
        team_id: None,
    })?;

    store.add_payment_method("PIX", "Pix", 6.0)?;
    store.add_payment_method("credit", "Credit card", 4.0)?;
    store.add_payment_method("CASH", "Cash", 5.0)?;

    for (seller, amount) in sellers.iter().zip([10_000.0, 8_000.0, 12_000.0]) {
        store.add_goal(NewGoal {
            target: GoalTarget::Individual(*seller),
            period: "2025-08".parse()?,
            target_amount: amount,
            recurring: true,
        })?;
    }
    store.add_goal(NewGoal {
        target: GoalTarget::Team(north),
        period: "2025-08".parse()?,
        target_amount: 20_000.0,
        recurring: false,
    })?;
    store.add_goal(NewGoal {
        target: GoalTarget::Team(south),
        period: "2025".parse()?,
        target_amount: 150_000.0,
        recurring: false,
    })?;

    let sales = [
        (sellers[0], 4_000.0, "PIX", date(2025, 8, 2)),
        (sellers[0], 3_500.0, "CREDIT", date(2025, 8, 11)),
        (sellers[1], 2_000.0, "CASH", date(2025, 8, 4)),
        (sellers[1], 6_500.0, "PIX", date(2025, 8, 19)),
        (sellers[2], 5_000.0, "CREDIT", date(2025, 8, 7)),
        (sellers[2], 9_000.0, "CREDIT", date(2025, 7, 28)),
    ];
    for (seller, amount, code, on) in sales {
        store.record_sale(NewSale {
            collaborator_id: seller,
            client_name: format!("Client of #{}", seller),
            amount,
            date: on,
            payment_method_code: code.to_string(),
            status: SaleStatus::Confirmed,
        })?;
    }

    Ok((store, sellers))
}

#[test]
fn test_month_close_fixture_end_to_end() -> Result<()> {
    let snapshot = SalesSnapshot::from_json_str(
        r#"{
            "collaborators": [
                { "id": 5, "name": "Marina", "role": "seller", "team_id": null, "status": "active" }
            ],
            "payment_methods": [
                { "id": 1, "code": "PIX", "name": "PIX", "commission_percentage": 6.0, "active": true }
            ],
            "goals": [
                {
                    "id": 1,
                    "target": { "scope": "individual", "id": 5 },
                    "period": "2025-08",
                    "target_amount": 1000.0,
                    "kind": "monthly",
                    "recurring": true,
                    "status": "active"
                }
            ],
            "sales": [
                {
                    "id": 1,
                    "collaborator_id": 5,
                    "client_name": "Padaria Central",
                    "amount": 1000.0,
                    "date": "2025-08-14",
                    "payment_method_code": "PIX",
                    "status": "confirmed"
                }
            ]
        }"#,
    )?;

    let mut store = SalesStore::from_snapshot(snapshot, EngineConfig::default(), date(2025, 9, 1));
    let outcome = store.close_month(ClosingOverrides::default())?;

    assert_eq!(outcome.closing_period.to_string(), "2025-08");
    assert_eq!(outcome.new_commissions.len(), 1);
    let commission = &outcome.new_commissions[0];
    assert_eq!(commission.collaborator_id, 5);
    assert_eq!(commission.total_commission, 60.0);
    assert_eq!(commission.status, CommissionStatus::Pending);
    assert_eq!(commission.breakdown.len(), 1);
    assert_eq!(commission.breakdown[0].payment_method_code, "PIX");
    assert_eq!(commission.breakdown[0].sales_total, 1000.0);
    assert_eq!(commission.breakdown[0].commission_amount, 60.0);

    let goals = &store.snapshot().goals;
    assert_eq!(goals.len(), 2);
    assert_eq!(goals[0].status, GoalStatus::Completed);
    assert_eq!(goals[1].period.to_string(), "2025-09");
    assert_eq!(goals[1].status, GoalStatus::Active);
    assert_eq!(goals[1].target_amount, 1000.0);
    assert!(goals[1].recurring);

    let second = store.close_month(ClosingOverrides::default());
    assert!(matches!(
        second,
        Err(SalesEngineError::AlreadyClosed { existing: 1, .. })
    ));

    println!("✓ Month close fixture passed: {}", serde_json::to_string(commission)?);
    Ok(())
}

#[test]
fn test_dashboard_for_retail_team() -> Result<()> {
    let (store, sellers) = retail_store()?;
    let view = store.dashboard();

    assert_eq!(view.month_period.to_string(), "2025-08");
    assert_eq!(view.kpis.total_sales_count, 5);
    assert_eq!(view.kpis.total_sales_amount, 21_000.0);

    let marina = view.collaborator(sellers[0]).unwrap();
    assert_eq!(marina.sold, 7_500.0);
    assert!((marina.commission - 380.0).abs() < 1e-9);
    assert_eq!(marina.attainment_percentage, 75.0);

    let rafael = view.collaborator(sellers[1]).unwrap();
    assert_eq!(rafael.attainment_percentage, 106.0);
    assert!((rafael.commission - 490.0).abs() < 1e-9);

    // The July sale is outside the window
    let joana = view.collaborator(sellers[2]).unwrap();
    assert_eq!(joana.sold, 5_000.0);
    assert_eq!(joana.attainment_percentage, 42.0);

    assert_eq!(view.kpis.collaborators_on_target, 1);
    assert_eq!(view.kpis.collaborators_lagging, 2);

    let north = view.teams.iter().find(|t| t.name == "North").unwrap();
    assert_eq!(north.sold, 16_000.0);
    assert_eq!(north.attainment_percentage, 80.0);

    // Annual team goal counts the whole year, July included
    let annual = view
        .goals
        .iter()
        .find(|g| g.kind == GoalKind::Annual)
        .unwrap();
    assert_eq!(annual.achieved, 14_000.0);
    assert_eq!(annual.attainment_percentage, 9.0);

    // The admin without sales still shows up with zero
    assert_eq!(view.collaborators.len(), 4);
    assert!(view.warnings.is_empty());
    Ok(())
}

#[test]
fn test_range_view_spans_months() -> Result<()> {
    let (mut store, sellers) = retail_store()?;
    store.set_view(ViewMode::Range {
        start: date(2025, 7, 1),
        end: date(2025, 8, 31),
    });

    let view = store.dashboard();
    assert_eq!(view.kpis.total_sales_count, 6);
    assert_eq!(view.collaborator(sellers[2]).unwrap().sold, 14_000.0);
    Ok(())
}

#[test]
fn test_preview_equals_closed_commissions() -> Result<()> {
    let (mut store, _) = retail_store()?;
    let preview = store.commission_preview();

    store.set_simulated_date(date(2025, 9, 3));
    let outcome = store.close_month(ClosingOverrides::default())?;

    assert_eq!(preview.len(), outcome.new_commissions.len());
    for (expected, commission) in preview.iter().zip(&outcome.new_commissions) {
        assert_eq!(expected.collaborator_id, commission.collaborator_id);
        assert_eq!(expected.period, commission.period);
        assert_eq!(expected.breakdown, commission.breakdown);
        assert_eq!(expected.total_commission, commission.total_commission);
        assert!((commission.breakdown_sum() - commission.total_commission).abs() < 1e-9);
    }

    assert!(store.verify_integrity(0.001).is_clean());
    Ok(())
}

#[test]
fn test_close_with_overrides_rolls_recurring_goals() -> Result<()> {
    let (mut store, sellers) = retail_store()?;
    let marina_goal = store
        .snapshot()
        .goals
        .iter()
        .find(|g| g.is_individual_for(sellers[0]))
        .map(|g| g.id)
        .unwrap();

    store.set_simulated_date(date(2025, 9, 3));
    let outcome = store.close_month(ClosingOverrides::new().with_target(marina_goal, 12_000.0))?;

    assert_eq!(outcome.completed_goal_ids.len(), 3);
    assert_eq!(outcome.created_goal_ids.len(), 3);

    let september: Vec<&Goal> = store
        .snapshot()
        .goals
        .iter()
        .filter(|g| g.period.to_string() == "2025-09")
        .collect();
    assert_eq!(september.len(), 3);
    let marina_next = september
        .iter()
        .find(|g| g.is_individual_for(sellers[0]))
        .unwrap();
    assert_eq!(marina_next.target_amount, 12_000.0);

    // The non-recurring team goal and the annual goal stay as they were
    let team_goal = store
        .snapshot()
        .goals
        .iter()
        .find(|g| matches!(g.target, GoalTarget::Team(_)) && g.kind == GoalKind::Monthly)
        .unwrap();
    assert_eq!(team_goal.status, GoalStatus::Active);
    Ok(())
}

#[test]
fn test_unchecked_close_twice_duplicates() -> Result<()> {
    let (store, _) = retail_store()?;
    let snapshot = store.snapshot().clone();
    let august = MonthPeriod::new(2025, 8)?;
    let now = Utc.with_ymd_and_hms(2025, 9, 1, 6, 0, 0).unwrap();
    let mut ids = IdSequence::after(&snapshot);

    let first = compute_month_close(&snapshot, august, &ClosingOverrides::default(), now, &mut ids)?;
    let mut applied = snapshot.clone();
    applied.commissions.extend(first.new_commissions);
    applied.goals = first.goals;

    let second = compute_month_close(&applied, august, &ClosingOverrides::default(), now, &mut ids)?;
    applied.commissions.extend(second.new_commissions);

    assert_eq!(applied.commissions.len(), 6);
    let result = IntegrityChecker::new(&applied).verify(0.001);
    let duplicates = result
        .violations
        .iter()
        .filter(|v| matches!(v, IntegrityViolation::DuplicateCommission { .. }))
        .count();
    assert_eq!(duplicates, 3);

    // The checked path refuses instead
    let request = ClosingRequest::new(now);
    assert!(close_month(&applied, &request).unwrap_err().is_precondition());
    Ok(())
}

#[test]
fn test_approval_flow_and_statement() -> Result<()> {
    let (mut store, sellers) = retail_store()?;
    store.set_simulated_date(date(2025, 9, 2));
    let outcome = store.close_month(ClosingOverrides::default())?;
    let ids: Vec<CommissionId> = outcome.new_commissions.iter().map(|c| c.id).collect();
    let admin = 4;

    store.approve_commission(ids[0], admin, Some("ok"))?;
    store.mark_commission_paid(ids[0])?;
    store.approve_commission(ids[1], admin, None)?;
    store.reject_commission(ids[2], admin, "Sale under review")?;

    let err = store.approve_commission(ids[2], admin, None).unwrap_err();
    assert!(err.is_precondition());

    let statement = store.commission_statement(MonthPeriod::new(2025, 8)?);
    assert_eq!(statement.line_count(), 3);
    assert_eq!(statement.paid[0].collaborator_id, sellers[0]);
    assert_eq!(statement.rejected[0].collaborator_name.as_deref(), Some("Joana"));
    assert!((statement.paid_total() - 380.0).abs() < 1e-9);
    assert!((statement.payable_total() - 870.0).abs() < 1e-9);

    let csv = statement.to_csv();
    assert!(csv.contains("2025-08,rejected"));
    Ok(())
}

#[test]
fn test_threshold_notifications_through_outbox() -> Result<()> {
    let (mut store, sellers) = retail_store()?;
    let mut sink = RecordingSink::default();

    // Marina went 40% -> 75%, Rafael 25% -> 106%
    let delivered = store.dispatch_notifications(&mut sink);
    assert_eq!(delivered, 2);
    assert!(store.pending_events().is_empty());
    let crossed: Vec<CollaboratorId> = sink.received.iter().map(|s| s.collaborator_id).collect();
    assert_eq!(crossed, vec![sellers[0], sellers[1]]);

    // Joana from 42% to 83%
    store.record_sale(NewSale {
        collaborator_id: sellers[2],
        client_name: "Atacado Norte".to_string(),
        amount: 5_000.0,
        date: date(2025, 8, 26),
        payment_method_code: "pix".to_string(),
        status: SaleStatus::Pending,
    })?;
    assert_eq!(store.dispatch_notifications(&mut sink), 1);
    assert_eq!(sink.received[2].attainment_percentage, 83.0);
    Ok(())
}

#[test]
fn test_notifications_can_be_disabled() -> Result<()> {
    let config = EngineConfig::from_json_str(r#"{ "notifications_enabled": false }"#)?;
    assert_eq!(config.notification_trigger_percentage, 75.0);

    let (store, _) = retail_store()?;
    let mut store = SalesStore::from_snapshot(store.into_snapshot(), config, date(2025, 8, 25));
    store.record_sale(NewSale {
        collaborator_id: 1,
        client_name: "Loja Azul".to_string(),
        amount: 5_000.0,
        date: date(2025, 8, 25),
        payment_method_code: "PIX".to_string(),
        status: SaleStatus::Confirmed,
    })?;

    let mut sink = RecordingSink::default();
    assert_eq!(store.dispatch_notifications(&mut sink), 0);
    assert!(sink.received.is_empty());
    assert!(store.pending_events().is_empty());
    Ok(())
}

#[test]
fn test_csv_import() -> Result<()> {
    let (mut store, sellers) = retail_store()?;
    let data = "\
collaborator_id,client_name,amount,date,payment_method_code,status
1,Padaria Central,1200.50,2025-08-21,pix,
2,Oficina Lima,300,2025-08-22T10:15:00,CREDIT,pending
3,Bar do Porto,-10,2025-08-22,PIX,
9,Mercado Sol,100,2025-08-22,PIX,
3,Casa Verde,450,2025-08-23,BOLETO,
";

    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let rows: Vec<SaleRow> = reader.deserialize().collect::<std::result::Result<_, _>>()?;
    assert_eq!(rows.len(), 5);

    let before = store.snapshot().sales.len();
    let report = store.import_sales(&rows);

    assert_eq!(report.accepted_count(), 2);
    assert_eq!(report.sales[0].collaborator_id, sellers[0]);
    assert_eq!(report.sales[0].payment_method_code, "PIX");
    assert_eq!(report.sales[1].status, SaleStatus::Pending);
    let rejected: Vec<usize> = report.rejected.iter().map(|r| r.row).collect();
    assert_eq!(rejected, vec![2, 3, 4]);

    assert_eq!(store.snapshot().sales.len(), before + 2);
    assert_eq!(store.pending_events().len(), 6 + 2);
    Ok(())
}

#[test]
fn test_snapshot_schema_and_config_schema() -> Result<()> {
    let schema = SalesSnapshot::schema_as_json()?;
    assert!(schema.contains("payment_method_code"));

    let config_schema = EngineConfig::schema_as_json()?;
    assert!(config_schema.contains("notification_trigger_percentage"));
    Ok(())
}
