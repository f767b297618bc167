use std::collections::BTreeMap;

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::dues::generation::{self, GenerationOutcome};
use crate::dues::status::{check_transition, evaluate_status};
use crate::dues::{Due, DuesCatalog, DuesStore};
use crate::errors::{DuesError, Result};
use crate::events::{Event, EventStore};
use crate::notifications::{
    NotificationContext, NotificationLog, NotificationSender, NotificationTemplate,
    ReminderOutcome,
};
use crate::payments::{PaymentInput, PaymentLedger};
use crate::period::Period;
use crate::registry::Registry;
use crate::reports::{self, ReportRecord, ReportRenderer, ReportStore};
use crate::types::{
    ActorScope, AssociationId, DueId, DueStatus, DuesTypeId, Feature, NotificationChannel,
    NotificationStatus, PaymentId, Periodicity, PlanTier, ReportFormat, ReportId, ReportKind,
    ReportStatus, Role, TemplateId, UnitId, UserId,
};

/// the dues engine: associations, units, recurring dues, payments,
/// notifications and reports behind one facade.
///
/// All wall-clock access goes through the caller's `SafeTimeProvider`;
/// mutations that belong to one association take an `ActorScope` resolved
/// at the presentation boundary.
pub struct DuesEngine {
    config: EngineConfig,
    registry: Registry,
    catalog: DuesCatalog,
    dues: DuesStore,
    ledger: PaymentLedger,
    templates: BTreeMap<TemplateId, NotificationTemplate>,
    notifications: Vec<NotificationLog>,
    reports: ReportStore,
    events: EventStore,
}

impl DuesEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            catalog: DuesCatalog::new(),
            dues: DuesStore::new(),
            ledger: PaymentLedger::new(),
            templates: BTreeMap::new(),
            notifications: Vec::new(),
            reports: ReportStore::new(),
            events: EventStore::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn catalog(&self) -> &DuesCatalog {
        &self.catalog
    }

    pub fn dues_store(&self) -> &DuesStore {
        &self.dues
    }

    pub fn ledger(&self) -> &PaymentLedger {
        &self.ledger
    }

    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }

    pub fn notifications(&self) -> &[NotificationLog] {
        &self.notifications
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    // ----- identity and registry -----

    /// platform scope creates any user; association scope creates residents
    pub fn register_user(
        &mut self,
        scope: &ActorScope,
        username: &str,
        full_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        role: Role,
        time_provider: &SafeTimeProvider,
    ) -> Result<UserId> {
        match (scope, role) {
            (ActorScope::Platform, _) => {}
            (ActorScope::Association(_), Role::Resident) => {}
            _ => return Err(DuesError::AccessDenied),
        }
        self.registry.add_user(
            username.to_string(),
            full_name.to_string(),
            email.map(str::to_string),
            phone.map(str::to_string),
            role,
            time_provider.now(),
        )
    }

    pub fn register_association(
        &mut self,
        scope: &ActorScope,
        name: &str,
        address: &str,
        plan: PlanTier,
        admin: UserId,
        time_provider: &SafeTimeProvider,
    ) -> Result<AssociationId> {
        scope.authorize_platform()?;
        let id = self.registry.register_association(
            name.to_string(),
            address.to_string(),
            plan,
            admin,
            time_provider.now(),
        )?;
        self.events.emit(Event::AssociationRegistered {
            association_id: id,
            name: name.to_string(),
        });
        Ok(id)
    }

    pub fn set_association_active(
        &mut self,
        scope: &ActorScope,
        association_id: AssociationId,
        active: bool,
    ) -> Result<()> {
        scope.authorize_platform()?;
        self.registry.set_association_active(association_id, active)
    }

    pub fn add_unit(
        &mut self,
        scope: &ActorScope,
        association_id: AssociationId,
        number: &str,
        surface: Option<Decimal>,
        dues_override: Option<Money>,
    ) -> Result<UnitId> {
        scope.authorize(association_id)?;
        let plan = self.registry.association(association_id)?.plan;
        let max_units = self.config.plans.max_units(plan);
        let id = self.registry.add_unit(
            association_id,
            number.to_string(),
            surface,
            dues_override,
            max_units,
        )?;
        self.events.emit(Event::UnitRegistered {
            association_id,
            unit_id: id,
            number: number.to_string(),
        });
        Ok(id)
    }

    pub fn link_resident(
        &mut self,
        scope: &ActorScope,
        unit_id: UnitId,
        user_id: UserId,
    ) -> Result<()> {
        let association_id = self.registry.unit(unit_id)?.association_id;
        scope.authorize(association_id)?;
        self.registry.link_resident(unit_id, user_id)?;
        self.events.emit(Event::ResidentLinked { unit_id, user_id });
        Ok(())
    }

    // ----- dues-type catalog -----

    pub fn define_dues_type(
        &mut self,
        scope: &ActorScope,
        association_id: AssociationId,
        name: &str,
        amount: Money,
        periodicity: Periodicity,
    ) -> Result<DuesTypeId> {
        scope.authorize(association_id)?;
        self.registry.association(association_id)?;
        let id = self
            .catalog
            .define(association_id, name.to_string(), amount, periodicity)?;
        self.events.emit(Event::DuesTypeDefined {
            association_id,
            dues_type_id: id,
            name: name.trim().to_string(),
            amount,
            periodicity,
        });
        Ok(id)
    }

    pub fn set_dues_type_active(
        &mut self,
        scope: &ActorScope,
        dues_type_id: DuesTypeId,
        active: bool,
    ) -> Result<()> {
        let association_id = self.catalog.get(dues_type_id)?.association_id;
        scope.authorize(association_id)?;
        self.catalog.set_active(dues_type_id, active)
    }

    pub fn set_dues_type_amount(
        &mut self,
        scope: &ActorScope,
        dues_type_id: DuesTypeId,
        amount: Money,
    ) -> Result<()> {
        let association_id = self.catalog.get(dues_type_id)?.association_id;
        scope.authorize(association_id)?;
        self.catalog.set_amount(dues_type_id, amount)
    }

    /// remove a dues type; fails while any due still references it
    pub fn remove_dues_type(&mut self, scope: &ActorScope, dues_type_id: DuesTypeId) -> Result<()> {
        let association_id = self.catalog.get(dues_type_id)?.association_id;
        scope.authorize(association_id)?;
        let referenced = self.dues.count_for_type(dues_type_id);
        self.catalog.remove(dues_type_id, referenced)
    }

    // ----- generation -----

    /// generate dues for one association and period; idempotent
    pub fn generate_dues_for_period(
        &mut self,
        scope: &ActorScope,
        association_id: AssociationId,
        period: Period,
        only_type: Option<DuesTypeId>,
        time_provider: &SafeTimeProvider,
    ) -> Result<GenerationOutcome> {
        scope.authorize(association_id)?;
        self.registry.active_association(association_id)?;
        generation::generate_for_association(
            &self.registry,
            &self.catalog,
            &mut self.dues,
            &self.config,
            &mut self.events,
            association_id,
            period,
            only_type,
            time_provider.now(),
        )
    }

    /// scheduled batch: generate for every active association
    pub fn generate_all_for_period(
        &mut self,
        period: Period,
        time_provider: &SafeTimeProvider,
    ) -> Result<GenerationOutcome> {
        let ids: Vec<AssociationId> =
            self.registry.active_associations().map(|a| a.id).collect();
        let mut total = GenerationOutcome::default();
        for association_id in ids {
            total.merge(generation::generate_for_association(
                &self.registry,
                &self.catalog,
                &mut self.dues,
                &self.config,
                &mut self.events,
                association_id,
                period,
                None,
                time_provider.now(),
            )?);
        }
        tracing::info!(
            period = %period,
            created = total.created,
            skipped = total.skipped,
            "batch generation finished"
        );
        Ok(total)
    }

    // ----- status state machine -----

    /// lazily recompute one due's status as of now
    pub fn refresh_due_status(
        &mut self,
        due_id: DueId,
        time_provider: &SafeTimeProvider,
    ) -> Result<DueStatus> {
        let today = time_provider.now().date_naive();
        let due = self.dues.get_mut(due_id)?;
        let old_status = due.status;
        let new_status = evaluate_status(old_status, due.due_date, today);
        if new_status != old_status {
            due.status = new_status;
            self.events.emit(Event::StatusChanged {
                due_id,
                old_status,
                new_status,
                reason: format!("evaluated as of {today}"),
                timestamp: time_provider.now(),
            });
        }
        Ok(new_status)
    }

    /// read access corrects the status before returning the due
    pub fn due(&mut self, due_id: DueId, time_provider: &SafeTimeProvider) -> Result<&Due> {
        self.refresh_due_status(due_id, time_provider)?;
        self.dues.get(due_id)
    }

    /// batch sweep over all non-terminal dues; returns the transition count
    pub fn sweep_overdue_statuses(&mut self, time_provider: &SafeTimeProvider) -> Result<u32> {
        let mut transitions = 0;
        for due_id in self.dues.ids() {
            let before = self.dues.get(due_id)?.status;
            if before.is_terminal() {
                continue;
            }
            let after = self.refresh_due_status(due_id, time_provider)?;
            if after != before {
                transitions += 1;
            }
        }
        tracing::info!(transitions, "overdue sweep finished");
        Ok(transitions)
    }

    /// manual cancellation, admin only, never automatic
    pub fn cancel_due(
        &mut self,
        scope: &ActorScope,
        due_id: DueId,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        self.refresh_due_status(due_id, time_provider)?;
        let due = self.dues.get(due_id)?;
        let association_id = self.registry.unit(due.unit_id)?.association_id;
        scope.authorize(association_id)?;
        let old_status = due.status;
        check_transition(old_status, DueStatus::Cancelled)?;

        let now = time_provider.now();
        self.dues.get_mut(due_id)?.status = DueStatus::Cancelled;
        self.events.emit(Event::StatusChanged {
            due_id,
            old_status,
            new_status: DueStatus::Cancelled,
            reason: "cancelled by admin".to_string(),
            timestamp: now,
        });
        self.events.emit(Event::DueCancelled {
            due_id,
            timestamp: now,
        });
        Ok(())
    }

    /// move a due date; an overdue due whose new date lies in the future
    /// drops back to due
    pub fn reschedule_due(
        &mut self,
        scope: &ActorScope,
        due_id: DueId,
        new_due_date: NaiveDate,
        time_provider: &SafeTimeProvider,
    ) -> Result<DueStatus> {
        let due = self.dues.get(due_id)?;
        let association_id = self.registry.unit(due.unit_id)?.association_id;
        scope.authorize(association_id)?;
        if due.status.is_terminal() {
            return Err(DuesError::InvalidStatusTransition {
                from: due.status,
                to: DueStatus::Due,
            });
        }
        let old_due_date = due.due_date;

        self.dues.get_mut(due_id)?.due_date = new_due_date;
        self.events.emit(Event::DueRescheduled {
            due_id,
            old_due_date,
            new_due_date,
            timestamp: time_provider.now(),
        });
        self.refresh_due_status(due_id, time_provider)
    }

    // ----- payments -----

    /// record a payment against a due and mark the due paid.
    ///
    /// The one-to-one relation with the due makes the paid transition
    /// at-most-once; a second payment is an integrity error.
    pub fn record_payment(
        &mut self,
        scope: &ActorScope,
        input: PaymentInput,
        recorded_by: UserId,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentId> {
        self.refresh_due_status(input.due_id, time_provider)?;

        let due = self.dues.get(input.due_id)?;
        let due_id = due.id;
        let old_status = due.status;
        let unit = self.registry.unit(due.unit_id)?;
        let association = self.registry.association(unit.association_id)?;
        scope.authorize(association.id)?;
        self.registry.user(recorded_by)?;
        check_transition(old_status, DueStatus::Paid)?;

        let association_id = association.id;
        let association_name = association.name.clone();
        let now = time_provider.now();
        let payment_id = self.ledger.record(
            input,
            association_id,
            &association_name,
            recorded_by,
            now,
        )?;

        let payment = self.ledger.get(payment_id)?;
        let amount = payment.amount;
        let method = payment.method;
        let receipt_number = payment.receipt_number.clone();

        self.dues.get_mut(due_id)?.status = DueStatus::Paid;
        self.events.emit(Event::PaymentRecorded {
            payment_id,
            due_id,
            amount,
            method,
            receipt_number,
            timestamp: now,
        });
        self.events.emit(Event::StatusChanged {
            due_id,
            old_status,
            new_status: DueStatus::Paid,
            reason: "payment recorded".to_string(),
            timestamp: now,
        });
        Ok(payment_id)
    }

    /// flag the receipt as generated and return its number; the number was
    /// assigned at recording and never changes
    pub fn issue_receipt(
        &mut self,
        scope: &ActorScope,
        payment_id: PaymentId,
        time_provider: &SafeTimeProvider,
    ) -> Result<String> {
        let payment = self.ledger.get(payment_id)?;
        let due = self.dues.get(payment.due_id)?;
        let association_id = self.registry.unit(due.unit_id)?.association_id;
        scope.authorize(association_id)?;

        let payment = self.ledger.mark_receipt_generated(payment_id)?;
        let receipt_number = payment.receipt_number.clone();
        self.events.emit(Event::ReceiptIssued {
            payment_id,
            receipt_number: receipt_number.clone(),
            timestamp: time_provider.now(),
        });
        Ok(receipt_number)
    }

    /// overpayment (positive) or shortfall (negative) of a payment
    pub fn payment_difference(&self, payment_id: PaymentId) -> Result<Money> {
        let payment = self.ledger.get(payment_id)?;
        let due = self.dues.get(payment.due_id)?;
        Ok(payment.difference(due.amount))
    }

    /// informational late penalty under the configured policy
    pub fn late_penalty(
        &self,
        due_id: DueId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Money> {
        let Some(policy) = self.config.penalty else {
            return Ok(Money::ZERO);
        };
        let due = self.dues.get(due_id)?;
        if !due.is_open() {
            return Ok(Money::ZERO);
        }
        let today = time_provider.now().date_naive();
        if due.days_overdue(today) > policy.grace_days {
            Ok(due.amount.percentage(policy.rate.as_percentage()))
        } else {
            Ok(Money::ZERO)
        }
    }

    // ----- listings -----

    /// all dues of an association, status-corrected, newest period first
    pub fn dues_for_association(
        &mut self,
        scope: &ActorScope,
        association_id: AssociationId,
        status: Option<DueStatus>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Vec<Due>> {
        scope.authorize(association_id)?;
        let ids = self.due_ids_of(association_id);
        for due_id in &ids {
            self.refresh_due_status(*due_id, time_provider)?;
        }

        let mut result = Vec::with_capacity(ids.len());
        for due_id in ids {
            let due = self.dues.get(due_id)?;
            if status.map(|s| due.status == s).unwrap_or(true) {
                result.push(due.clone());
            }
        }
        result.sort_by(|a, b| b.period.cmp(&a.period));
        Ok(result)
    }

    /// a resident's own dues
    pub fn dues_for_resident(
        &mut self,
        scope: &ActorScope,
        time_provider: &SafeTimeProvider,
    ) -> Result<Vec<Due>> {
        let user_id = scope.resident().ok_or(DuesError::AccessDenied)?;
        let Some(unit_id) = self.registry.resident_unit(user_id) else {
            return Ok(Vec::new());
        };

        let ids: Vec<DueId> = self.dues.for_unit(unit_id).iter().map(|d| d.id).collect();
        let mut result = Vec::with_capacity(ids.len());
        for due_id in ids {
            self.refresh_due_status(due_id, time_provider)?;
            result.push(self.dues.get(due_id)?.clone());
        }
        result.sort_by(|a, b| b.period.cmp(&a.period));
        Ok(result)
    }

    fn due_ids_of(&self, association_id: AssociationId) -> Vec<DueId> {
        self.dues
            .iter()
            .filter(|due| {
                self.registry
                    .unit(due.unit_id)
                    .map(|unit| unit.association_id == association_id)
                    .unwrap_or(false)
            })
            .map(|due| due.id)
            .collect()
    }

    // ----- notifications -----

    pub fn define_template(
        &mut self,
        scope: &ActorScope,
        name: &str,
        channel: NotificationChannel,
        subject: &str,
        body: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<TemplateId> {
        scope.authorize_platform()?;
        let template = NotificationTemplate::new(
            name.to_string(),
            channel,
            subject.to_string(),
            body.to_string(),
            time_provider.now(),
        )?;
        let id = template.id;
        self.templates.insert(id, template);
        Ok(id)
    }

    /// install the standard overdue reminder template
    pub fn install_overdue_template(&mut self, time_provider: &SafeTimeProvider) -> TemplateId {
        let template = NotificationTemplate::overdue_reminder(time_provider.now());
        let id = template.id;
        self.templates.insert(id, template);
        id
    }

    /// rendering data for one due, per the notification collaborator contract
    pub fn notification_context(&self, due_id: DueId) -> Result<NotificationContext> {
        let due = self.dues.get(due_id)?;
        let unit = self.registry.unit(due.unit_id)?;
        let association = self.registry.association(unit.association_id)?;

        let (resident_name, resident_email, resident_phone) = match unit.resident {
            Some(user_id) => {
                let user = self.registry.user(user_id)?;
                (
                    user.full_name.clone(),
                    user.email.clone(),
                    user.phone.clone(),
                )
            }
            None => ("resident".to_string(), None, None),
        };

        Ok(NotificationContext {
            resident_name,
            resident_email,
            resident_phone,
            unit_number: unit.number.clone(),
            association_name: association.name.clone(),
            amount: due.amount,
            period: due.period.label(),
            due_date: due.due_date,
            status: due.status.label().to_string(),
        })
    }

    /// remind residents of dues overdue past the configured grace.
    ///
    /// Each recipient is attempted independently; a send failure is caught,
    /// journaled with the error text and never aborts the batch.
    pub fn send_overdue_reminders(
        &mut self,
        sender: &mut dyn NotificationSender,
        template_id: TemplateId,
        time_provider: &SafeTimeProvider,
    ) -> Result<ReminderOutcome> {
        let template = self
            .templates
            .get(&template_id)
            .ok_or(DuesError::TemplateNotFound { id: template_id })?
            .clone();
        let today = time_provider.now().date_naive();
        let now = time_provider.now();

        // lazy correction first, so yesterday's dues are seen as overdue
        for due_id in self.dues.ids() {
            if !self.dues.get(due_id)?.status.is_terminal() {
                self.refresh_due_status(due_id, time_provider)?;
            }
        }

        let channel_feature = match template.channel {
            NotificationChannel::Email => Feature::Email,
            NotificationChannel::Sms => Feature::Sms,
        };

        let mut outcome = ReminderOutcome::default();
        let mut candidates: Vec<(DueId, AssociationId, String, String, String)> = Vec::new();
        for due in self.dues.iter() {
            if due.status != DueStatus::Overdue
                || due.days_overdue(today) <= self.config.reminder_grace_days
            {
                continue;
            }
            let unit = self.registry.unit(due.unit_id)?;
            let association = self.registry.association(unit.association_id)?;
            if !association.active {
                outcome.skipped += 1;
                continue;
            }
            if !self.config.plans.allows(association.plan, channel_feature) {
                outcome.skipped += 1;
                continue;
            }

            let context = self.notification_context(due.id)?;
            let recipient = match template.channel {
                NotificationChannel::Email => context.resident_email.clone(),
                NotificationChannel::Sms => context.resident_phone.clone(),
            };
            let Some(recipient) = recipient else {
                outcome.skipped += 1;
                continue;
            };

            let (subject, body) = template.render(&context);
            candidates.push((due.id, association.id, recipient, subject, body));
        }

        for (due_id, association_id, recipient, subject, body) in candidates {
            outcome.attempted += 1;
            let (status, error) =
                match sender.send(template.channel, &recipient, &subject, &body) {
                    Ok(()) => {
                        outcome.sent += 1;
                        (NotificationStatus::Sent, None)
                    }
                    Err(err) => {
                        outcome.failed += 1;
                        tracing::warn!(recipient = %recipient, error = %err.message, "reminder dispatch failed");
                        (NotificationStatus::Error, Some(err.message))
                    }
                };

            let notification_id = Uuid::new_v4();
            self.notifications.push(NotificationLog {
                id: notification_id,
                channel: template.channel,
                recipient: recipient.clone(),
                subject,
                body,
                status,
                attempts: 1,
                error,
                association_id: Some(association_id),
                due_id: Some(due_id),
                sent_at: now,
            });
            self.events.emit(Event::NotificationLogged {
                notification_id,
                channel: template.channel,
                recipient,
                status,
                timestamp: now,
            });
        }

        tracing::info!(
            attempted = outcome.attempted,
            sent = outcome.sent,
            failed = outcome.failed,
            skipped = outcome.skipped,
            "reminder batch finished"
        );
        Ok(outcome)
    }

    /// re-attempt failed notifications still under the attempt cap
    pub fn retry_failed_notifications(
        &mut self,
        sender: &mut dyn NotificationSender,
        time_provider: &SafeTimeProvider,
    ) -> Result<u32> {
        let max_attempts = self.config.max_notification_attempts;
        let now = time_provider.now();
        let mut retried = 0;

        for log in self.notifications.iter_mut() {
            if !log.can_retry(max_attempts) {
                continue;
            }
            log.attempts += 1;
            match sender.send(log.channel, &log.recipient, &log.subject, &log.body) {
                Ok(()) => {
                    log.status = NotificationStatus::Sent;
                    log.error = None;
                    log.sent_at = now;
                }
                Err(err) => {
                    log.error = Some(err.message);
                }
            }
            retried += 1;
        }

        tracing::info!(retried, "notification retry pass finished");
        Ok(retried)
    }

    // ----- reports -----

    /// aggregate the period window, render through the collaborator and
    /// store the artifact; one report per (association, period, kind)
    pub fn generate_report(
        &mut self,
        scope: &ActorScope,
        association_id: AssociationId,
        period: Period,
        kind: ReportKind,
        renderer: &dyn ReportRenderer,
        generated_by: UserId,
        time_provider: &SafeTimeProvider,
    ) -> Result<ReportId> {
        scope.authorize(association_id)?;
        let association = self.registry.association(association_id)?;
        let format = renderer.format();
        if format == ReportFormat::Excel
            && !self.config.plans.allows(association.plan, Feature::ExcelExport)
        {
            return Err(DuesError::FeatureNotAvailable {
                feature: Feature::ExcelExport,
                plan: association.plan,
            });
        }
        self.registry.user(generated_by)?;

        let ids = self.due_ids_of(association_id);
        let mut window_dues = Vec::with_capacity(ids.len());
        for due_id in &ids {
            window_dues.push(self.dues.get(*due_id)?);
        }
        let data = reports::aggregate(association_id, period, kind, &window_dues, &self.ledger);
        let artifact = renderer.render(&data)?;

        let now = time_provider.now();
        let record = ReportRecord {
            id: Uuid::new_v4(),
            association_id,
            period,
            kind,
            format,
            status: ReportStatus::Generated,
            data,
            size_bytes: artifact.len() as u64,
            artifact,
            generated_by,
            generated_at: now,
        };
        let report_id = self.reports.insert(record)?;

        self.events.emit(Event::ReportGenerated {
            report_id,
            association_id,
            period: period.start(),
            kind,
            format,
            timestamp: now,
        });
        tracing::info!(%association_id, period = %period, ?kind, ?format, "report generated");
        Ok(report_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::DispatchError;
    use crate::types::PaymentMethod;
    use chrono::{Duration, TimeZone, Utc};
    use hourglass_rs::TimeSource;

    fn test_time(year: i32, month: u32, day: u32) -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap(),
        ))
    }

    struct Fixture {
        engine: DuesEngine,
        scope: ActorScope,
        admin: UserId,
        resident: UserId,
        association: AssociationId,
        unit: UnitId,
        dues_type: DuesTypeId,
    }

    fn fixture(plan: PlanTier, time: &SafeTimeProvider) -> Fixture {
        let mut engine = DuesEngine::new(EngineConfig::standard());
        let platform = ActorScope::Platform;

        let admin = engine
            .register_user(
                &platform,
                "amina",
                "Amina B",
                Some("amina@example.org"),
                None,
                Role::AssociationAdmin,
                time,
            )
            .unwrap();
        let association = engine
            .register_association(
                &platform,
                "Les Oliviers",
                "12 rue des Oliviers",
                plan,
                admin,
                time,
            )
            .unwrap();
        let scope = ActorScope::Association(association);

        let resident = engine
            .register_user(
                &scope,
                "karim",
                "Karim H",
                Some("karim@example.org"),
                Some("0551234567"),
                Role::Resident,
                time,
            )
            .unwrap();
        let unit = engine
            .add_unit(&scope, association, "A1", None, None)
            .unwrap();
        engine.link_resident(&scope, unit, resident).unwrap();

        let dues_type = engine
            .define_dues_type(
                &scope,
                association,
                "Charges communes",
                Money::from_major(3000),
                Periodicity::Monthly,
            )
            .unwrap();

        Fixture {
            engine,
            scope,
            admin,
            resident,
            association,
            unit,
            dues_type,
        }
    }

    fn march() -> Period {
        Period::from_ymd(2024, 3).unwrap()
    }

    struct FailingSender {
        calls: u32,
    }

    impl NotificationSender for FailingSender {
        fn send(
            &mut self,
            _channel: NotificationChannel,
            _recipient: &str,
            _subject: &str,
            _body: &str,
        ) -> std::result::Result<(), DispatchError> {
            self.calls += 1;
            Err(DispatchError {
                message: "smtp connection refused".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct CollectingSender {
        sent: Vec<(String, String)>,
    }

    impl NotificationSender for CollectingSender {
        fn send(
            &mut self,
            _channel: NotificationChannel,
            recipient: &str,
            subject: &str,
            _body: &str,
        ) -> std::result::Result<(), DispatchError> {
            self.sent.push((recipient.to_string(), subject.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_generation_is_idempotent() {
        let time = test_time(2024, 2, 25);
        let mut f = fixture(PlanTier::Silver, &time);
        f.engine
            .add_unit(&f.scope, f.association, "A2", None, None)
            .unwrap();

        let first = f
            .engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        assert_eq!(first.created, 2);
        assert_eq!(first.skipped, 0);

        let second = f
            .engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(f.engine.dues_store().len(), 2);
    }

    #[test]
    fn test_generated_due_fields() {
        let time = test_time(2024, 2, 25);
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let dues = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap();
        assert_eq!(dues.len(), 1);

        let due = &dues[0];
        assert_eq!(due.amount, Money::from_major(3000));
        assert_eq!(due.status, DueStatus::Due);
        // default policy: 10th of the month following the billing interval
        assert_eq!(
            due.due_date,
            chrono::NaiveDate::from_ymd_opt(2024, 4, 10).unwrap()
        );
    }

    #[test]
    fn test_unit_override_takes_precedence() {
        let time = test_time(2024, 2, 25);
        let mut f = fixture(PlanTier::Silver, &time);
        f.engine
            .add_unit(
                &f.scope,
                f.association,
                "B7",
                None,
                Some(Money::from_major(2500)),
            )
            .unwrap();

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let dues = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap();

        let amounts: Vec<Money> = dues.iter().map(|d| d.amount).collect();
        assert!(amounts.contains(&Money::from_major(3000)));
        assert!(amounts.contains(&Money::from_major(2500)));
    }

    #[test]
    fn test_payment_settles_due_exactly_once() {
        let time = test_time(2024, 3, 15);
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;

        let input = PaymentInput {
            due_id,
            amount: Money::from_major(3000),
            method: PaymentMethod::Cash,
            reference: None,
            paid_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        };
        let payment_id = f
            .engine
            .record_payment(&f.scope, input.clone(), f.admin, &time)
            .unwrap();

        assert_eq!(f.engine.due(due_id, &time).unwrap().status, DueStatus::Paid);
        let payment = f.engine.ledger().get(payment_id).unwrap();
        assert_eq!(payment.receipt_number, "LES-2024-0001");
        assert!(payment.is_complete(Money::from_major(3000)));

        // one-to-one relation rejects the second payment
        let second = f.engine.record_payment(&f.scope, input, f.admin, &time);
        assert!(matches!(second, Err(DuesError::PaymentAlreadyRecorded { .. })));
        assert_eq!(f.engine.due(due_id, &time).unwrap().status, DueStatus::Paid);
    }

    #[test]
    fn test_lazy_overdue_transition_is_monotonic() {
        let time = test_time(2024, 2, 25);
        let controller = time.test_control().unwrap();
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;
        f.engine.take_events();

        // due date is 2024-04-10; move past it
        controller.advance(Duration::days(50)); // 2024-04-15
        assert_eq!(f.engine.due(due_id, &time).unwrap().status, DueStatus::Overdue);
        let transitions = f
            .engine
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, Event::StatusChanged { .. }))
            .count();
        assert_eq!(transitions, 1);

        // evaluated again a day later: still overdue, no duplicate transition
        controller.advance(Duration::days(1));
        assert_eq!(f.engine.due(due_id, &time).unwrap().status, DueStatus::Overdue);
        assert!(f
            .engine
            .take_events()
            .into_iter()
            .all(|e| !matches!(e, Event::StatusChanged { .. })));
    }

    #[test]
    fn test_paid_due_never_changes_under_sweep() {
        let time = test_time(2024, 3, 15);
        let controller = time.test_control().unwrap();
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;
        f.engine
            .record_payment(
                &f.scope,
                PaymentInput {
                    due_id,
                    amount: Money::from_major(3000),
                    method: PaymentMethod::Transfer,
                    reference: Some("VIR-889".to_string()),
                    paid_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                },
                f.admin,
                &time,
            )
            .unwrap();

        controller.advance(Duration::days(90));
        let transitions = f.engine.sweep_overdue_statuses(&time).unwrap();
        assert_eq!(transitions, 0);
        assert_eq!(f.engine.due(due_id, &time).unwrap().status, DueStatus::Paid);
    }

    #[test]
    fn test_sweep_flips_open_dues_only() {
        let time = test_time(2024, 2, 25);
        let controller = time.test_control().unwrap();
        let mut f = fixture(PlanTier::Silver, &time);
        f.engine
            .add_unit(&f.scope, f.association, "A2", None, None)
            .unwrap();

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;

        // pay one of the two before the due date passes
        controller.advance(Duration::days(10));
        f.engine
            .record_payment(
                &f.scope,
                PaymentInput {
                    due_id,
                    amount: Money::from_major(3000),
                    method: PaymentMethod::Cash,
                    reference: None,
                    paid_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                },
                f.admin,
                &time,
            )
            .unwrap();

        controller.advance(Duration::days(60));
        let transitions = f.engine.sweep_overdue_statuses(&time).unwrap();
        assert_eq!(transitions, 1);
    }

    #[test]
    fn test_cancel_guards_terminal_states() {
        let time = test_time(2024, 3, 15);
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;

        f.engine
            .record_payment(
                &f.scope,
                PaymentInput {
                    due_id,
                    amount: Money::from_major(3000),
                    method: PaymentMethod::Cash,
                    reference: None,
                    paid_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                },
                f.admin,
                &time,
            )
            .unwrap();

        // nothing leaves the paid state
        let cancel = f.engine.cancel_due(&f.scope, due_id, &time);
        assert!(matches!(cancel, Err(DuesError::InvalidStatusTransition { .. })));
    }

    #[test]
    fn test_cancelled_due_rejects_payment() {
        let time = test_time(2024, 3, 15);
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;
        f.engine.cancel_due(&f.scope, due_id, &time).unwrap();

        let payment = f.engine.record_payment(
            &f.scope,
            PaymentInput {
                due_id,
                amount: Money::from_major(3000),
                method: PaymentMethod::Cash,
                reference: None,
                paid_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            },
            f.admin,
            &time,
        );
        assert!(matches!(payment, Err(DuesError::InvalidStatusTransition { .. })));
    }

    #[test]
    fn test_reschedule_reverses_overdue() {
        let time = test_time(2024, 2, 25);
        let controller = time.test_control().unwrap();
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;

        controller.advance(Duration::days(60)); // past 2024-04-10
        assert_eq!(f.engine.due(due_id, &time).unwrap().status, DueStatus::Overdue);

        let status = f
            .engine
            .reschedule_due(
                &f.scope,
                due_id,
                chrono::NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
                &time,
            )
            .unwrap();
        assert_eq!(status, DueStatus::Due);
    }

    #[test]
    fn test_receipt_numbers_unique_within_year() {
        let time = test_time(2024, 3, 15);
        let mut f = fixture(PlanTier::Silver, &time);
        f.engine
            .add_unit(&f.scope, f.association, "A2", None, None)
            .unwrap();
        f.engine
            .add_unit(&f.scope, f.association, "A3", None, None)
            .unwrap();

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let dues = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap();

        let mut receipts = Vec::new();
        for due in &dues {
            let payment_id = f
                .engine
                .record_payment(
                    &f.scope,
                    PaymentInput {
                        due_id: due.id,
                        amount: due.amount,
                        method: PaymentMethod::Cash,
                        reference: None,
                        paid_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                    },
                    f.admin,
                    &time,
                )
                .unwrap();
            receipts.push(
                f.engine
                    .ledger()
                    .get(payment_id)
                    .unwrap()
                    .receipt_number
                    .clone(),
            );
        }

        receipts.sort();
        assert_eq!(receipts, vec!["LES-2024-0001", "LES-2024-0002", "LES-2024-0003"]);
    }

    #[test]
    fn test_overdue_reminders_log_failures_and_cap_retries() {
        let time = test_time(2024, 2, 25);
        let controller = time.test_control().unwrap();
        let mut f = fixture(PlanTier::Silver, &time);
        let template_id = f.engine.install_overdue_template(&time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();

        // 2024-04-10 due date + 7-day grace: advance well past both
        controller.advance(Duration::days(60));

        let mut sender = FailingSender { calls: 0 };
        let outcome = f
            .engine
            .send_overdue_reminders(&mut sender, template_id, &time)
            .unwrap();
        assert_eq!(outcome.attempted, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.sent, 0);

        let log = &f.engine.notifications()[0];
        assert_eq!(log.status, NotificationStatus::Error);
        assert_eq!(log.attempts, 1);
        assert_eq!(log.error.as_deref(), Some("smtp connection refused"));
        assert_eq!(log.recipient, "karim@example.org");

        // two more failing retries reach the cap of 3 attempts
        assert_eq!(f.engine.retry_failed_notifications(&mut sender, &time).unwrap(), 1);
        assert_eq!(f.engine.retry_failed_notifications(&mut sender, &time).unwrap(), 1);
        assert_eq!(f.engine.notifications()[0].attempts, 3);

        // no longer retry-eligible
        assert_eq!(f.engine.retry_failed_notifications(&mut sender, &time).unwrap(), 0);
        assert_eq!(sender.calls, 3);
    }

    #[test]
    fn test_overdue_reminders_send_and_skip_within_grace() {
        let time = test_time(2024, 2, 25);
        let controller = time.test_control().unwrap();
        let mut f = fixture(PlanTier::Silver, &time);
        let template_id = f.engine.install_overdue_template(&time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();

        // past the due date but inside the 7-day reminder grace: nothing sent
        controller.advance(Duration::days(48)); // 2024-04-13
        let mut sender = CollectingSender::default();
        let outcome = f
            .engine
            .send_overdue_reminders(&mut sender, template_id, &time)
            .unwrap();
        assert_eq!(outcome.attempted, 0);

        controller.advance(Duration::days(10));
        let outcome = f
            .engine
            .send_overdue_reminders(&mut sender, template_id, &time)
            .unwrap();
        assert_eq!(outcome.sent, 1);
        assert_eq!(sender.sent[0].0, "karim@example.org");
        assert_eq!(sender.sent[0].1, "Payment reminder - Les Oliviers");
    }

    #[test]
    fn test_late_penalty_policy() {
        let time = test_time(2024, 2, 25);
        let controller = time.test_control().unwrap();
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;

        // overdue but inside the 30-day penalty grace
        controller.advance(Duration::days(55)); // 2024-04-20
        assert_eq!(f.engine.late_penalty(due_id, &time).unwrap(), Money::ZERO);

        // 5% once more than 30 days late
        controller.advance(Duration::days(30));
        assert_eq!(
            f.engine.late_penalty(due_id, &time).unwrap(),
            Money::from_major(150)
        );
    }

    #[test]
    fn test_report_generation_and_duplicate_guard() {
        let time = test_time(2024, 3, 15);
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;
        f.engine
            .record_payment(
                &f.scope,
                PaymentInput {
                    due_id,
                    amount: Money::from_major(3000),
                    method: PaymentMethod::Cash,
                    reference: None,
                    paid_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                },
                f.admin,
                &time,
            )
            .unwrap();

        let renderer = crate::reports::CsvRenderer;
        let report_id = f
            .engine
            .generate_report(
                &f.scope,
                f.association,
                march(),
                ReportKind::Monthly,
                &renderer,
                f.admin,
                &time,
            )
            .unwrap();

        let record = f.engine.reports().get(report_id).unwrap();
        assert_eq!(record.data.dues_count, 1);
        assert_eq!(record.data.total_collected, Money::from_major(3000));
        assert_eq!(record.size_bytes as usize, record.artifact.len());

        let duplicate = f.engine.generate_report(
            &f.scope,
            f.association,
            march(),
            ReportKind::Monthly,
            &renderer,
            f.admin,
            &time,
        );
        assert!(matches!(duplicate, Err(DuesError::DuplicateReport { .. })));
    }

    #[test]
    fn test_excel_reports_gated_by_plan() {
        struct ExcelStub;
        impl ReportRenderer for ExcelStub {
            fn format(&self) -> ReportFormat {
                ReportFormat::Excel
            }
            fn render(&self, _data: &crate::reports::ReportData) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
        }

        let time = test_time(2024, 3, 15);
        let mut f = fixture(PlanTier::Basic, &time);

        let result = f.engine.generate_report(
            &f.scope,
            f.association,
            march(),
            ReportKind::Monthly,
            &ExcelStub,
            f.admin,
            &time,
        );
        assert!(matches!(
            result,
            Err(DuesError::FeatureNotAvailable {
                feature: Feature::ExcelExport,
                plan: PlanTier::Basic,
            })
        ));
    }

    #[test]
    fn test_scope_enforcement() {
        let time = test_time(2024, 2, 25);
        let mut f = fixture(PlanTier::Silver, &time);
        let foreign_scope = ActorScope::Association(Uuid::new_v4());

        let generation =
            f.engine
                .generate_dues_for_period(&foreign_scope, f.association, march(), None, &time);
        assert!(matches!(generation, Err(DuesError::AccessDenied)));

        let resident_scope = ActorScope::Resident(f.resident);
        let listing =
            f.engine
                .dues_for_association(&resident_scope, f.association, None, &time);
        assert!(matches!(listing, Err(DuesError::AccessDenied)));
    }

    #[test]
    fn test_resident_sees_only_own_dues() {
        let time = test_time(2024, 2, 25);
        let mut f = fixture(PlanTier::Silver, &time);

        // a second unit with another resident
        let other_resident = f
            .engine
            .register_user(
                &f.scope,
                "nadia",
                "Nadia T",
                Some("nadia@example.org"),
                None,
                Role::Resident,
                &time,
            )
            .unwrap();
        let other_unit = f
            .engine
            .add_unit(&f.scope, f.association, "A2", None, None)
            .unwrap();
        f.engine
            .link_resident(&f.scope, other_unit, other_resident)
            .unwrap();

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();

        let own = f
            .engine
            .dues_for_resident(&ActorScope::Resident(f.resident), &time)
            .unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].unit_id, f.unit);
    }

    #[test]
    fn test_dues_type_referential_guard() {
        let time = test_time(2024, 2, 25);
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();

        let blocked = f.engine.remove_dues_type(&f.scope, f.dues_type);
        assert!(matches!(blocked, Err(DuesError::DuesTypeInUse { .. })));

        // an unreferenced type removes cleanly
        let unused = f
            .engine
            .define_dues_type(
                &f.scope,
                f.association,
                "Ascenseur",
                Money::from_major(500),
                Periodicity::Quarterly,
            )
            .unwrap();
        f.engine.remove_dues_type(&f.scope, unused).unwrap();
    }

    #[test]
    fn test_batch_generation_covers_active_associations_only() {
        let time = test_time(2024, 2, 25);
        let mut f = fixture(PlanTier::Silver, &time);
        let platform = ActorScope::Platform;

        // a second association, deactivated
        let other_admin = f
            .engine
            .register_user(
                &platform,
                "walid",
                "Walid M",
                None,
                None,
                Role::AssociationAdmin,
                &time,
            )
            .unwrap();
        let other = f
            .engine
            .register_association(
                &platform,
                "Cité du Parc",
                "3 avenue du Parc",
                PlanTier::Basic,
                other_admin,
                &time,
            )
            .unwrap();
        let other_scope = ActorScope::Association(other);
        f.engine
            .add_unit(&other_scope, other, "P1", None, None)
            .unwrap();
        f.engine
            .define_dues_type(
                &other_scope,
                other,
                "Charges",
                Money::from_major(2000),
                Periodicity::Monthly,
            )
            .unwrap();
        f.engine
            .set_association_active(&platform, other, false)
            .unwrap();

        let outcome = f.engine.generate_all_for_period(march(), &time).unwrap();
        assert_eq!(outcome.created, 1); // only the active association's unit
    }

    #[test]
    fn test_issue_receipt_is_stable() {
        let time = test_time(2024, 3, 15);
        let mut f = fixture(PlanTier::Silver, &time);

        f.engine
            .generate_dues_for_period(&f.scope, f.association, march(), None, &time)
            .unwrap();
        let due_id = f
            .engine
            .dues_for_association(&f.scope, f.association, None, &time)
            .unwrap()[0]
            .id;
        let payment_id = f
            .engine
            .record_payment(
                &f.scope,
                PaymentInput {
                    due_id,
                    amount: Money::from_major(3200),
                    method: PaymentMethod::Check,
                    reference: Some("CHQ-1042".to_string()),
                    paid_on: chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                },
                f.admin,
                &time,
            )
            .unwrap();

        let first = f.engine.issue_receipt(&f.scope, payment_id, &time).unwrap();
        let second = f.engine.issue_receipt(&f.scope, payment_id, &time).unwrap();
        assert_eq!(first, second);
        assert!(f.engine.ledger().get(payment_id).unwrap().receipt_generated);

        // overpayment surfaced for reporting, not rejected
        assert_eq!(
            f.engine.payment_difference(payment_id).unwrap(),
            Money::from_major(200)
        );
    }
}
