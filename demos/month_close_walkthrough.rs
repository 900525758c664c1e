use chrono::NaiveDate;
use sales_commission_engine::*;

struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn deliver(&mut self, signal: &GoalThresholdCrossed) -> Result<()> {
        println!(
            "  🔔 Collaborator #{} reached {}% of the {} goal",
            signal.collaborator_id, signal.attainment_percentage, signal.period
        );
        Ok(())
    }
}

fn day(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| SalesEngineError::InvalidPeriod(format!("{}-{:02}-{:02}", y, m, d)))
}

fn main() -> Result<()> {
    println!("=== Sales Commission Engine: month close walkthrough ===\n");

    let mut store = SalesStore::new(EngineConfig::default(), day(2025, 8, 10)?);

    let team = store.add_team("Downtown")?;
    let marina = store.add_collaborator(NewCollaborator {
        name: "Marina".to_string(),
        role: CollaboratorRole::Seller,
        team_id: Some(team),
    })?;
    let rafael = store.add_collaborator(NewCollaborator {
        name: "Rafael".to_string(),
        role: CollaboratorRole::Seller,
        team_id: Some(team),
    })?;
    let admin = store.add_collaborator(NewCollaborator {
        name: "Paula".to_string(),
        role: CollaboratorRole::Admin,
        team_id: None,
    })?;

    store.add_payment_method("PIX", "Pix", 6.0)?;
    store.add_payment_method("CREDIT", "Credit card", 4.0)?;

    for (seller, target) in [(marina, 5_000.0), (rafael, 4_000.0)] {
        store.add_goal(NewGoal {
            target: GoalTarget::Individual(seller),
            period: "2025-08".parse()?,
            target_amount: target,
            recurring: true,
        })?;
    }

    println!("📝 Recording August sales...");
    let sales = [
        (marina, "Padaria Central", 2_500.0, "PIX", 4),
        (rafael, "Oficina Lima", 1_800.0, "CREDIT", 6),
        (marina, "Mercado Sol", 1_500.0, "CREDIT", 12),
        (rafael, "Casa Verde", 1_700.0, "PIX", 19),
    ];
    for (seller, client, amount, code, d) in sales {
        store.record_sale(NewSale {
            collaborator_id: seller,
            client_name: client.to_string(),
            amount,
            date: day(2025, 8, d)?,
            payment_method_code: code.to_string(),
            status: SaleStatus::Confirmed,
        })?;
    }
    let delivered = store.dispatch_notifications(&mut ConsoleSink);
    println!("  {} notifications delivered\n", delivered);

    let dashboard = store.dashboard();
    println!("📊 Dashboard for {}", dashboard.month_period);
    for row in &dashboard.collaborators {
        println!(
            "  {:<8} sold {:>9.2}  commission {:>7.2}  goal {:>3}%",
            row.name, row.sold, row.commission, row.attainment_percentage
        );
    }
    println!(
        "  Total {:.2} over {} sales (avg ticket {:.2})\n",
        dashboard.kpis.total_sales_amount,
        dashboard.kpis.total_sales_count,
        dashboard.kpis.average_ticket
    );

    store.set_simulated_date(day(2025, 9, 1)?);
    println!("🗓  Closing {:?}...", store.closable_period().map(|p| p.to_string()));
    let outcome = store.close_month(ClosingOverrides::new().with_target(1, 6_000.0))?;
    for commission in &outcome.new_commissions {
        println!(
            "  Commission #{} for #{}: {:.2}",
            commission.id, commission.collaborator_id, commission.total_commission
        );
        for entry in &commission.breakdown {
            println!(
                "    {:<7} {:>9.2} -> {:>7.2}",
                entry.payment_method_code, entry.sales_total, entry.commission_amount
            );
        }
    }
    println!(
        "  {} goals completed, {} created for {}\n",
        outcome.completed_goal_ids.len(),
        outcome.created_goal_ids.len(),
        outcome.next_period
    );

    if let Err(e) = store.close_month(ClosingOverrides::default()) {
        println!("⚠️  Second close refused: {}\n", e);
    }

    let first = outcome.new_commissions[0].id;
    let second = outcome.new_commissions[1].id;
    store.approve_commission(first, admin, Some("Checked against receipts"))?;
    store.mark_commission_paid(first)?;
    store.reject_commission(second, admin, "Client asked for a refund")?;

    let statement = store.commission_statement(outcome.closing_period);
    println!("📄 Statement for {}", statement.period);
    print!("{}", statement.to_csv());
    println!("  Payable total: {:.2}", statement.payable_total());

    let check = store.verify_integrity(0.001);
    println!(
        "\n✅ Integrity: {} violations, {} warnings",
        check.violations.len(),
        check.warnings.len()
    );

    Ok(())
}
