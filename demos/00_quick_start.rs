/// quick start - minimal example to get started
use residence_dues_rs::views::AssociationView;
use residence_dues_rs::{
    ActorScope, DuesEngine, EngineConfig, Money, PaymentInput, PaymentMethod, Period, Periodicity,
    PlanTier, Role, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::System);
    let mut engine = DuesEngine::new(EngineConfig::standard());
    let platform = ActorScope::Platform;

    // one association with one unit
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
        PlanTier::Basic,
        admin,
        &time,
    )?;
    let scope = ActorScope::Association(association);
    engine.add_unit(&scope, association, "A1", None, None)?;

    // a monthly charge of 3000
    engine.define_dues_type(
        &scope,
        association,
        "Charges communes",
        Money::from_major(3000),
        Periodicity::Monthly,
    )?;

    // bill march and settle it
    let period = Period::from_ymd(2024, 3)?;
    engine.generate_dues_for_period(&scope, association, period, None, &time)?;

    let due = engine.dues_for_association(&scope, association, None, &time)?[0].clone();
    engine.record_payment(
        &scope,
        PaymentInput {
            due_id: due.id,
            amount: due.amount,
            method: PaymentMethod::Cash,
            reference: None,
            paid_on: time.now().date_naive(),
        },
        admin,
        &time,
    )?;

    // print current state
    let view = AssociationView::from_engine(&engine, association)?;
    println!("{}", view.to_json_pretty()?);

    Ok(())
}
