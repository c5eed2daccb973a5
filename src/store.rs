//! Back-office review store: the owned list of submitted jobs.

use rand::Rng;
use uuid::Uuid;

use crate::packet::FieldSubmission;
use crate::submission::{
    FinancialData, FinancialStatus, GisStatus, InspectionStatus, SubmittedJobData,
};

/// Status update requested for one lifecycle track of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusUpdate {
    Inspection(InspectionStatus),
    Gis(GisStatus),
    Financial(FinancialStatus),
}

/// Exclusively-mutated collection of submitted jobs, keyed by instance id.
#[derive(Debug, Default)]
pub struct ReviewStore {
    jobs: Vec<SubmittedJobData>,
}

impl ReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All jobs in submission order.
    pub fn jobs(&self) -> &[SubmittedJobData] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&SubmittedJobData> {
        self.jobs.iter().find(|j| j.instance_id == id)
    }

    /// Append a new job with a fresh id, timestamp, and all statuses Pending.
    pub fn record_submission(&mut self, submission: FieldSubmission) -> Uuid {
        let job = SubmittedJobData::from_submission(submission);
        let id = job.instance_id;
        tracing::info!(
            "submission recorded: {} ({})",
            job.work_order.work_order_number,
            id
        );
        self.jobs.push(job);
        id
    }

    /// Apply a status update if it is legal for the job's current state.
    ///
    /// Returns false (and changes nothing) for an unknown id or an illegal
    /// transition. Moving the financial track to Generated also synthesizes a
    /// mock financial record.
    pub fn update_status(&mut self, id: Uuid, update: StatusUpdate) -> bool {
        let Some(job) = self.jobs.iter_mut().find(|j| j.instance_id == id) else {
            return false;
        };
        match update {
            StatusUpdate::Inspection(new) => {
                // Approve/Reject only while the inspection is still open.
                if job.inspection_status != InspectionStatus::Pending
                    || new == InspectionStatus::Pending
                {
                    return false;
                }
                job.inspection_status = new;
            }
            StatusUpdate::Gis(new) => {
                if new != GisStatus::Posted
                    || job.inspection_status != InspectionStatus::Approved
                    || job.gis_status != GisStatus::Pending
                {
                    return false;
                }
                job.gis_status = GisStatus::Posted;
            }
            StatusUpdate::Financial(new) => {
                if new != FinancialStatus::Generated
                    || job.inspection_status != InspectionStatus::Approved
                    || job.financial_status != FinancialStatus::Pending
                {
                    return false;
                }
                job.financial_status = FinancialStatus::Generated;
                job.financials = Some(synthesize_financials());
            }
        }
        tracing::info!("status updated: {} {:?}", id, update);
        true
    }

    /// Store rendered report fragments on their jobs. Unknown ids are skipped.
    pub fn attach_reports(&mut self, reports: Vec<(Uuid, String)>) {
        for (id, html) in reports {
            if let Some(job) = self.jobs.iter_mut().find(|j| j.instance_id == id) {
                job.report_html = Some(html);
            }
        }
    }

    /// Clear all submitted jobs.
    pub fn reset(&mut self) {
        tracing::info!("review store reset ({} jobs dropped)", self.jobs.len());
        self.jobs.clear();
    }

    /// Whether Approve/Reject is currently offered for this job.
    pub fn can_inspect(job: &SubmittedJobData) -> bool {
        job.inspection_status == InspectionStatus::Pending
    }

    /// Whether GIS posting is currently offered for this job.
    pub fn can_post_gis(job: &SubmittedJobData) -> bool {
        job.inspection_status == InspectionStatus::Approved && job.gis_status == GisStatus::Pending
    }

    /// Whether financial generation is currently offered for this job.
    pub fn can_generate_financials(job: &SubmittedJobData) -> bool {
        job.inspection_status == InspectionStatus::Approved
            && job.financial_status == FinancialStatus::Pending
    }
}

/// Mock-data generator standing in for a real costing service.
fn synthesize_financials() -> FinancialData {
    let mut rng = rand::rng();
    // Fixed demo ranges, rounded to cents.
    let labor_cost = round_cents(rng.random_range(800.0..2400.0));
    let material_cost = round_cents(rng.random_range(350.0..1900.0));
    FinancialData {
        report_id: format!("FIN-{}", Uuid::new_v4().simple()),
        labor_cost,
        material_cost,
        total_cost: round_cents(labor_cost + material_cost),
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FieldSubmission;
    use crate::workorder::mock_work_orders;

    /// Build a submission payload for the gas main work order.
    fn sample_submission() -> FieldSubmission {
        let wo = mock_work_orders()[0].clone();
        let mut checklist = wo.safety_checklist.clone();
        for item in &mut checklist {
            item.completed = true;
        }
        FieldSubmission {
            work_order: wo,
            completed_checklist: checklist,
            material_id: "GASPIPE-HDPE-4IN".into(),
            material_verified: true,
            gps_coords: "40.712800° N, 74.006000° W".into(),
            photo_data: "data:image/bmp;base64,QUJD".into(),
        }
    }

    #[test]
    fn test_record_initializes_all_tracks_pending() {
        let mut store = ReviewStore::new();
        let id = store.record_submission(sample_submission());
        let job = store.get(id).unwrap();
        assert_eq!(job.inspection_status, InspectionStatus::Pending);
        assert_eq!(job.gis_status, GisStatus::Pending);
        assert_eq!(job.financial_status, FinancialStatus::Pending);
        assert!(job.financials.is_none());
        assert!(job.report_html.is_none());
    }

    #[test]
    fn test_inspection_is_terminal() {
        let mut store = ReviewStore::new();
        let id = store.record_submission(sample_submission());
        assert!(store.update_status(id, StatusUpdate::Inspection(InspectionStatus::Approved)));
        // Neither re-approval nor a late rejection is accepted.
        assert!(!store.update_status(id, StatusUpdate::Inspection(InspectionStatus::Rejected)));
        assert!(!store.update_status(id, StatusUpdate::Inspection(InspectionStatus::Approved)));
        assert_eq!(
            store.get(id).unwrap().inspection_status,
            InspectionStatus::Approved
        );
    }

    #[test]
    fn test_gis_and_financial_require_approval() {
        let mut store = ReviewStore::new();
        let id = store.record_submission(sample_submission());

        // Rejected while inspection is still pending.
        assert!(!store.update_status(id, StatusUpdate::Gis(GisStatus::Posted)));
        assert!(!store.update_status(id, StatusUpdate::Financial(FinancialStatus::Generated)));
        assert_eq!(store.get(id).unwrap().gis_status, GisStatus::Pending);

        store.update_status(id, StatusUpdate::Inspection(InspectionStatus::Approved));
        assert!(store.update_status(id, StatusUpdate::Gis(GisStatus::Posted)));
        assert!(store.update_status(id, StatusUpdate::Financial(FinancialStatus::Generated)));

        // Already-completed tracks are no-ops.
        assert!(!store.update_status(id, StatusUpdate::Gis(GisStatus::Posted)));
        assert!(!store.update_status(id, StatusUpdate::Financial(FinancialStatus::Generated)));
    }

    #[test]
    fn test_rejected_inspection_blocks_downstream_tracks() {
        let mut store = ReviewStore::new();
        let id = store.record_submission(sample_submission());
        store.update_status(id, StatusUpdate::Inspection(InspectionStatus::Rejected));
        assert!(!store.update_status(id, StatusUpdate::Gis(GisStatus::Posted)));
        assert!(!store.update_status(id, StatusUpdate::Financial(FinancialStatus::Generated)));
    }

    #[test]
    fn test_generated_financials_total_is_exact_sum() {
        let mut store = ReviewStore::new();
        let id = store.record_submission(sample_submission());
        store.update_status(id, StatusUpdate::Inspection(InspectionStatus::Approved));
        store.update_status(id, StatusUpdate::Financial(FinancialStatus::Generated));

        let fin = store.get(id).unwrap().financials.as_ref().unwrap();
        assert!(fin.report_id.starts_with("FIN-"));
        assert!((800.0..2400.0).contains(&fin.labor_cost));
        assert!((350.0..1900.0).contains(&fin.material_cost));
        assert_eq!(fin.total_cost, round_cents(fin.labor_cost + fin.material_cost));
    }

    #[test]
    fn test_unknown_id_is_a_noop() {
        let mut store = ReviewStore::new();
        store.record_submission(sample_submission());
        assert!(!store.update_status(
            Uuid::new_v4(),
            StatusUpdate::Inspection(InspectionStatus::Approved)
        ));
    }

    #[test]
    fn test_attach_reports_and_reset() {
        let mut store = ReviewStore::new();
        let id = store.record_submission(sample_submission());
        store.attach_reports(vec![
            (id, "<div>report</div>".into()),
            (Uuid::new_v4(), "<div>orphan</div>".into()),
        ]);
        assert_eq!(
            store.get(id).unwrap().report_html.as_deref(),
            Some("<div>report</div>")
        );
        store.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn test_action_gating_queries() {
        let mut store = ReviewStore::new();
        let id = store.record_submission(sample_submission());
        {
            let job = store.get(id).unwrap();
            assert!(ReviewStore::can_inspect(job));
            assert!(!ReviewStore::can_post_gis(job));
            assert!(!ReviewStore::can_generate_financials(job));
        }
        store.update_status(id, StatusUpdate::Inspection(InspectionStatus::Approved));
        let job = store.get(id).unwrap();
        assert!(!ReviewStore::can_inspect(job));
        assert!(ReviewStore::can_post_gis(job));
        assert!(ReviewStore::can_generate_financials(job));
    }
}
