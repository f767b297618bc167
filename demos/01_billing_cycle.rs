/// billing cycle - generation, payment, sweep, reminders and a report
use chrono::{Duration, TimeZone, Utc};
use residence_dues_rs::{
    ActorScope, CsvRenderer, DuesEngine, EngineConfig, LoggingSender, Money, PaymentInput,
    PaymentMethod, Period, Periodicity, PlanTier, ReportKind, Role, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 2, 25, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let mut engine = DuesEngine::new(EngineConfig::standard());
    let platform = ActorScope::Platform;

    let admin = engine.register_user(
        &platform,
        "amina",
        "Amina B",
        Some("amina@example.org"),
        None,
        Role::AssociationAdmin,
        &time,
    )?;
    let association = engine.register_association(
        &platform,
        "Les Oliviers",
        "12 rue des Oliviers",
        PlanTier::Silver,
        admin,
        &time,
    )?;
    let scope = ActorScope::Association(association);

    // three units, one with a linked resident
    let resident = engine.register_user(
        &scope,
        "karim",
        "Karim H",
        Some("karim@example.org"),
        Some("0551234567"),
        Role::Resident,
        &time,
    )?;
    let unit = engine.add_unit(&scope, association, "A1", None, None)?;
    engine.add_unit(&scope, association, "A2", None, None)?;
    engine.add_unit(&scope, association, "A3", None, Some(Money::from_major(2500)))?;
    engine.link_resident(&scope, unit, resident)?;

    engine.define_dues_type(
        &scope,
        association,
        "Charges communes",
        Money::from_major(3000),
        Periodicity::Monthly,
    )?;

    // generate march dues
    let period = Period::from_ymd(2024, 3)?;
    let outcome = engine.generate_dues_for_period(&scope, association, period, None, &time)?;
    println!("generated {} dues for {}", outcome.created, period);

    // one resident pays on time
    let due = engine.dues_for_association(&scope, association, None, &time)?[0].clone();
    let payment_id = engine.record_payment(
        &scope,
        PaymentInput {
            due_id: due.id,
            amount: due.amount,
            method: PaymentMethod::Transfer,
            reference: Some("VIR-2024-114".to_string()),
            paid_on: time.now().date_naive(),
        },
        admin,
        &time,
    )?;
    let receipt = engine.issue_receipt(&scope, payment_id, &time)?;
    println!("payment recorded, receipt {receipt}");

    // two months later: sweep statuses and remind the laggards
    controller.advance(Duration::days(60));
    let transitions = engine.sweep_overdue_statuses(&time)?;
    println!("overdue sweep: {transitions} transitions");

    let template_id = engine.install_overdue_template(&time);
    let mut sender = LoggingSender;
    let reminders = engine.send_overdue_reminders(&mut sender, template_id, &time)?;
    println!(
        "reminders: {} attempted, {} sent, {} skipped",
        reminders.attempted, reminders.sent, reminders.skipped
    );

    // monthly report
    let report_id = engine.generate_report(
        &scope,
        association,
        period,
        ReportKind::Monthly,
        &CsvRenderer,
        admin,
        &time,
    )?;
    let report = engine.reports().get(report_id)?;
    println!(
        "report generated ({}):\n{}",
        report.human_size(),
        String::from_utf8_lossy(&report.artifact)
    );

    Ok(())
}
