//! Manual and project equipment assignments

use chrono::{Duration, NaiveDate};
use validator::Validate;

use super::{equipment_status, today};
use crate::{
    error::{AppError, AppResult},
    models::{
        assignment::{
            AssignmentContext, AssignmentOutcome, CompleteAssignment, CreateAssignment,
            EmployeeAssignment, EquipmentAssignment, NewEmployeeAssignment, NewEquipmentAssignment,
        },
        enums::AssignmentType,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AssignmentsService {
    repository: Repository,
}

impl AssignmentsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Ledger history of one equipment
    pub async fn equipment_history(&self, equipment_id: i32) -> AppResult<Vec<EquipmentAssignment>> {
        let mut conn = self.repository.pool.acquire().await?;
        self.repository.equipment.get(&mut conn, equipment_id).await?;
        self.repository.assignments.history_for_equipment(&mut conn, equipment_id).await
    }

    /// Ledger history of one employee
    pub async fn employee_history(&self, employee_id: i32) -> AppResult<Vec<EmployeeAssignment>> {
        let mut conn = self.repository.pool.acquire().await?;
        self.repository.assignments.history_for_employee(&mut conn, employee_id).await
    }

    /// Assign equipment to a project or an employee.
    ///
    /// Open manual/project entries of the equipment are handed over: they
    /// close the day before the new one starts, with the employee entries
    /// linked to them. An open rental entry blocks the assignment.
    pub async fn assign_equipment(
        &self,
        equipment_id: i32,
        data: CreateAssignment,
    ) -> AppResult<AssignmentOutcome> {
        data.validate()?;

        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        let equipment = repo
            .equipment
            .lock(&mut tx, &[equipment_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", equipment_id)))?;
        let open = repo.assignments.open_for_equipment(&mut tx, equipment_id).await?;
        let plan = plan_assignment(equipment_id, &data, &open)?;

        repo.assignments
            .close_equipment_entries(&mut tx, &plan.handed_over, plan.handover_date)
            .await?;
        let linked = repo
            .assignments
            .open_employee_for_equipment_entries(&mut tx, &plan.handed_over)
            .await?;
        repo.assignments
            .close_employee_entries(
                &mut tx,
                &lockstep_employee_entries(&plan.handed_over, &linked),
                plan.handover_date,
            )
            .await?;

        let assignment = repo
            .assignments
            .create_equipment_entry(
                &mut tx,
                &NewEquipmentAssignment {
                    equipment_id,
                    context: plan.context,
                    employee_id: data.employee_id,
                    start_date: data.start_date,
                    end_date: data.end_date,
                    daily_rate: data.daily_rate,
                    notes: data.notes.clone(),
                },
            )
            .await?;

        let employee_assignment = match data.employee_id {
            Some(employee_id) => Some(
                repo.assignments
                    .create_employee_entry(
                        &mut tx,
                        &NewEmployeeAssignment {
                            employee_id,
                            context: plan.context,
                            equipment_assignment_id: Some(assignment.id),
                            name: Some(equipment.name.clone()),
                            start_date: data.start_date,
                            end_date: data.end_date,
                            notes: data.notes.clone(),
                        },
                    )
                    .await?,
            ),
            None => None,
        };

        equipment_status::recompute_in(repo, &mut tx, &[equipment_id], today()).await?;
        tx.commit().await?;

        tracing::info!(
            equipment_id,
            assignment_id = assignment.id,
            context = %plan.context,
            handed_over = plan.handed_over.len(),
            "Equipment assigned"
        );

        Ok(AssignmentOutcome {
            assignment,
            employee_assignment,
            handed_over: plan.handed_over,
        })
    }

    /// Close one manual/project equipment entry and the employee entry linked to it.
    ///
    /// Rental entries only close through their rental.
    pub async fn complete_assignment(
        &self,
        assignment_id: i32,
        data: CompleteAssignment,
    ) -> AppResult<EquipmentAssignment> {
        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        let entry = repo.assignments.lock_equipment_entry(&mut tx, assignment_id).await?;
        let end_date = data.end_date.unwrap_or_else(today);
        check_assignment_completion(&entry, end_date)?;

        repo.equipment.lock(&mut tx, &[entry.equipment_id]).await?;
        repo.assignments
            .close_equipment_entries(&mut tx, &[assignment_id], end_date)
            .await?;
        let linked = repo
            .assignments
            .open_employee_for_equipment_entries(&mut tx, &[assignment_id])
            .await?;
        repo.assignments
            .close_employee_entries(&mut tx, &lockstep_employee_entries(&[assignment_id], &linked), end_date)
            .await?;

        equipment_status::recompute_in(repo, &mut tx, &[entry.equipment_id], today()).await?;
        let closed = repo.assignments.lock_equipment_entry(&mut tx, assignment_id).await?;
        tx.commit().await?;

        tracing::info!(
            assignment_id,
            equipment_id = closed.equipment_id,
            end_date = %end_date,
            "Assignment completed"
        );
        Ok(closed)
    }
}

/// What a manual/project assignment does to the equipment ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPlan {
    pub context: AssignmentContext,
    /// End date given to the handed-over entries
    pub handover_date: NaiveDate,
    pub handed_over: Vec<i32>,
}

/// Validate an assignment request against the equipment's open entries
pub fn plan_assignment(
    equipment_id: i32,
    data: &CreateAssignment,
    open: &[EquipmentAssignment],
) -> AppResult<AssignmentPlan> {
    let context = match data.assignment_type {
        AssignmentType::Project => AssignmentContext::Project(data.project_id.ok_or_else(|| {
            AppError::Validation("project_id is required for project assignments".to_string())
        })?),
        AssignmentType::Manual => {
            let employee_id = data.employee_id.ok_or_else(|| {
                AppError::Validation("employee_id is required for manual assignments".to_string())
            })?;
            AssignmentContext::Manual(Some(employee_id))
        }
        AssignmentType::Rental => {
            return Err(AppError::Validation(
                "Rental assignments are created by activating the rental".to_string(),
            ))
        }
    };
    if let Some(end) = data.end_date {
        if end < data.start_date {
            return Err(AppError::Validation(format!(
                "End date {} is before start date {}",
                end, data.start_date
            )));
        }
    }

    let open: Vec<&EquipmentAssignment> = open
        .iter()
        .filter(|e| e.equipment_id == equipment_id && e.is_open())
        .collect();
    if let Some(rental_entry) = open.iter().find(|e| e.assignment_type == AssignmentType::Rental) {
        return Err(AppError::Conflict(format!(
            "Equipment {} is on rental {} (assignment {})",
            equipment_id,
            rental_entry.rental_id.unwrap_or_default(),
            rental_entry.id
        )));
    }

    Ok(AssignmentPlan {
        context,
        handover_date: data.start_date - Duration::days(1),
        handed_over: open.iter().map(|e| e.id).collect(),
    })
}

/// An open manual/project entry may close on or after its start date
pub fn check_assignment_completion(entry: &EquipmentAssignment, end_date: NaiveDate) -> AppResult<()> {
    if entry.assignment_type == AssignmentType::Rental {
        return Err(AppError::InvalidState(format!(
            "Assignment {} belongs to rental {}, return the rental item instead",
            entry.id,
            entry.rental_id.unwrap_or_default()
        )));
    }
    if !entry.is_open() {
        return Err(AppError::InvalidState(format!(
            "Assignment {} is already completed",
            entry.id
        )));
    }
    if end_date < entry.start_date {
        return Err(AppError::Validation(format!(
            "End date {} is before start date {}",
            end_date, entry.start_date
        )));
    }
    Ok(())
}

/// Open employee entries linked to one of the closing equipment entries
pub fn lockstep_employee_entries(closing: &[i32], employee_entries: &[EmployeeAssignment]) -> Vec<i32> {
    employee_entries
        .iter()
        .filter(|e| e.is_open())
        .filter(|e| e.equipment_assignment_id.is_some_and(|id| closing.contains(&id)))
        .map(|e| e.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::AssignmentStatus;
    use chrono::Utc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
    }

    fn request(assignment_type: AssignmentType, employee_id: Option<i32>, start: NaiveDate) -> CreateAssignment {
        CreateAssignment {
            assignment_type,
            project_id: None,
            employee_id,
            start_date: start,
            end_date: None,
            daily_rate: None,
            notes: None,
        }
    }

    fn entry(id: i32, equipment_id: i32, context: AssignmentContext, start: NaiveDate) -> EquipmentAssignment {
        let now = Utc::now();
        EquipmentAssignment {
            id,
            equipment_id,
            assignment_type: context.assignment_type(),
            rental_id: context.rental_id(),
            project_id: context.project_id(),
            employee_id: match context {
                AssignmentContext::Manual(employee) => employee,
                _ => None,
            },
            start_date: start,
            end_date: None,
            status: AssignmentStatus::Active,
            daily_rate: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn employee_entry(id: i32, employee_id: i32, equipment_assignment_id: i32) -> EmployeeAssignment {
        let now = Utc::now();
        EmployeeAssignment {
            id,
            employee_id,
            assignment_type: AssignmentType::Manual,
            rental_id: None,
            project_id: None,
            equipment_assignment_id: Some(equipment_assignment_id),
            name: None,
            start_date: day(1),
            end_date: None,
            status: AssignmentStatus::Active,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_handover_closes_previous_entry_day_before_start() {
        let open = vec![entry(40, 10, AssignmentContext::Manual(Some(5)), day(1))];
        let plan = plan_assignment(10, &request(AssignmentType::Manual, Some(6), day(8)), &open).unwrap();
        assert_eq!(plan.context, AssignmentContext::Manual(Some(6)));
        assert_eq!(plan.handover_date, day(7));
        assert_eq!(plan.handed_over, vec![40]);
    }

    #[test]
    fn test_assignment_blocked_by_open_rental_entry() {
        let open = vec![entry(40, 10, AssignmentContext::Rental(3), day(1))];
        let result = plan_assignment(10, &request(AssignmentType::Manual, Some(6), day(8)), &open);
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_assignment_request_validation() {
        let missing_employee = plan_assignment(10, &request(AssignmentType::Manual, None, day(8)), &[]);
        assert!(matches!(missing_employee, Err(AppError::Validation(_))));

        let missing_project = plan_assignment(10, &request(AssignmentType::Project, Some(6), day(8)), &[]);
        assert!(matches!(missing_project, Err(AppError::Validation(_))));

        let rental = plan_assignment(10, &request(AssignmentType::Rental, Some(6), day(8)), &[]);
        assert!(matches!(rental, Err(AppError::Validation(_))));

        let mut inverted = request(AssignmentType::Manual, Some(6), day(8));
        inverted.end_date = Some(day(7));
        assert!(matches!(plan_assignment(10, &inverted, &[]), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_project_assignment_without_employee() {
        let mut data = request(AssignmentType::Project, None, day(8));
        data.project_id = Some(77);
        let plan = plan_assignment(10, &data, &[]).unwrap();
        assert_eq!(plan.context, AssignmentContext::Project(77));
        assert!(plan.handed_over.is_empty());
    }

    #[test]
    fn test_completing_one_equipment_keeps_other_equipment_of_same_employee() {
        // One employee holds equipment A (entry 40) and B (entry 41)
        let employee_entries = vec![employee_entry(90, 5, 40), employee_entry(91, 5, 41)];
        assert_eq!(lockstep_employee_entries(&[40], &employee_entries), vec![90]);
        assert_eq!(lockstep_employee_entries(&[41], &employee_entries), vec![91]);
        assert!(lockstep_employee_entries(&[], &employee_entries).is_empty());
    }

    #[test]
    fn test_lockstep_skips_closed_and_unlinked_entries() {
        let mut closed = employee_entry(90, 5, 40);
        closed.status = AssignmentStatus::Completed;
        let mut unlinked = employee_entry(92, 5, 40);
        unlinked.equipment_assignment_id = None;
        let linked = employee_entry(93, 6, 40);
        assert_eq!(lockstep_employee_entries(&[40], &[closed, unlinked, linked]), vec![93]);
    }

    #[test]
    fn test_rental_entry_cannot_be_completed_directly() {
        let rental_entry = entry(40, 10, AssignmentContext::Rental(3), day(1));
        match check_assignment_completion(&rental_entry, day(5)) {
            Err(AppError::InvalidState(msg)) => assert!(msg.contains("rental 3")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_completion_checks_state_and_dates() {
        let open = entry(40, 10, AssignmentContext::Manual(Some(5)), day(4));
        assert!(check_assignment_completion(&open, day(4)).is_ok());
        assert!(matches!(
            check_assignment_completion(&open, day(3)),
            Err(AppError::Validation(_))
        ));

        let mut closed = open.clone();
        closed.status = AssignmentStatus::Completed;
        assert!(matches!(
            check_assignment_completion(&closed, day(9)),
            Err(AppError::InvalidState(_))
        ));
    }
}
