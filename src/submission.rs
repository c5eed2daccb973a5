//! Submitted job records tracked by the back-office review store.

use chrono::Local;
use serde::Serialize;
use uuid::Uuid;

use crate::packet::FieldSubmission;
use crate::workorder::{ChecklistItem, WorkOrderPacket};

/// Inspection track. Terminal once Approved or Rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum InspectionStatus {
    Pending,
    Approved,
    Rejected,
}

/// GIS posting track. Posted requires an approved inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GisStatus {
    Pending,
    Posted,
}

/// Financial generation track. Generated requires an approved inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FinancialStatus {
    Pending,
    Generated,
}

impl InspectionStatus {
    /// Short label for tables and reports.
    pub fn label(&self) -> &'static str {
        match self {
            InspectionStatus::Pending => "Pending",
            InspectionStatus::Approved => "Approved",
            InspectionStatus::Rejected => "Rejected",
        }
    }
}

impl GisStatus {
    pub fn label(&self) -> &'static str {
        match self {
            GisStatus::Pending => "Pending",
            GisStatus::Posted => "Posted",
        }
    }
}

impl FinancialStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FinancialStatus::Pending => "Pending",
            FinancialStatus::Generated => "Generated",
        }
    }
}

/// Mock financial record synthesized when a job's financials are generated.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialData {
    pub report_id: String,
    pub labor_cost: f64,
    pub material_cost: f64,
    /// Always labor_cost + material_cost.
    pub total_cost: f64,
}

/// One frozen field submission plus its back-office lifecycle state.
///
/// `instance_id`, `submission_date`, and the embedded work order never change
/// after creation; only the three status tracks, financials, and the attached
/// report mutate, and only through the review store.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJobData {
    pub instance_id: Uuid,
    pub submission_date: String,
    pub work_order: WorkOrderPacket,
    pub completed_checklist: Vec<ChecklistItem>,
    pub material_id: String,
    pub material_verified: bool,
    pub gps_coords: String,
    pub photo_data: String,
    pub inspection_status: InspectionStatus,
    pub gis_status: GisStatus,
    pub financial_status: FinancialStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financials: Option<FinancialData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_html: Option<String>,
}

impl SubmittedJobData {
    /// Stamp a fresh instance id and timestamp onto an incoming payload.
    pub fn from_submission(submission: FieldSubmission) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            submission_date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            work_order: submission.work_order,
            completed_checklist: submission.completed_checklist,
            material_id: submission.material_id,
            material_verified: submission.material_verified,
            gps_coords: submission.gps_coords,
            photo_data: submission.photo_data,
            inspection_status: InspectionStatus::Pending,
            gis_status: GisStatus::Pending,
            financial_status: FinancialStatus::Pending,
            financials: None,
            report_html: None,
        }
    }
}
