/// time control - deterministic testing with controlled time
use chrono::{Duration, TimeZone, Utc};
use residence_dues_rs::{
    ActorScope, DueStatus, DuesEngine, EngineConfig, Money, Period, Periodicity, PlanTier, Role,
    SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== time control example ===\n");

    // create controlled time for testing
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    println!("starting date: {}", time.now().format("%Y-%m-%d"));

    let mut engine = DuesEngine::new(EngineConfig::standard());
    let platform = ActorScope::Platform;
    let admin = engine.register_user(
        &platform,
        "amina",
        "Amina B",
        None,
        None,
        Role::AssociationAdmin,
        &time,
    )?;
    let association = engine.register_association(
        &platform,
        "Les Oliviers",
        "12 rue des Oliviers",
        PlanTier::Basic,
        admin,
        &time,
    )?;
    let scope = ActorScope::Association(association);
    engine.add_unit(&scope, association, "A1", None, None)?;
    engine.define_dues_type(
        &scope,
        association,
        "Charges communes",
        Money::from_major(3000),
        Periodicity::Monthly,
    )?;

    // bill march; the due date lands on april 10th
    let period = Period::from_ymd(2024, 3)?;
    engine.generate_dues_for_period(&scope, association, period, None, &time)?;
    let due_id = engine.dues_for_association(&scope, association, None, &time)?[0].id;
    println!(
        "due created for {}, status {:?}",
        period,
        engine.due(due_id, &time)?.status
    );

    // advance to april 5th: still on time
    controller.advance(Duration::days(35));
    println!("\nadvanced to: {}", time.now().format("%Y-%m-%d"));
    assert_eq!(engine.due(due_id, &time)?.status, DueStatus::Due);
    println!("status: {:?}", engine.due(due_id, &time)?.status);

    // advance past the due date: lazy evaluation flips it
    controller.advance(Duration::days(10));
    println!("\nadvanced to: {}", time.now().format("%Y-%m-%d"));
    assert_eq!(engine.due(due_id, &time)?.status, DueStatus::Overdue);
    println!("status: {:?}", engine.due(due_id, &time)?.status);

    // 40+ days past the due date: the informational penalty kicks in
    controller.advance(Duration::days(30));
    println!("\nadvanced to: {}", time.now().format("%Y-%m-%d"));
    let penalty = engine.late_penalty(due_id, &time)?;
    println!("late penalty: {penalty}");

    Ok(())
}
