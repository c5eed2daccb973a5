//! HTML report generation for completed jobs.

use uuid::Uuid;

use crate::submission::SubmittedJobData;

const REPORT_CSS: &str = r#"
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; margin: 0; padding: 2rem; background-color: #f7fafc; color: #161616; }
  h1 { color: #29308E; border-bottom: 2px solid #29308E; padding-bottom: 0.5rem; }
  .container { max-width: 800px; margin: 0 auto; }
  .job-card { background-color: #fff; border: 1px solid #e2e8f0; border-radius: 0.75rem; margin-bottom: 2rem; padding: 1.5rem; box-shadow: 0 4px 6px -1px rgba(0, 0, 0, 0.1); }
  .job-card h2 { margin-top: 0; font-size: 1.25rem; color: #D05D2C; }
  .job-card img { max-width: 100%; height: auto; border-radius: 0.5rem; margin-top: 1.5rem; border: 1px solid #e2e8f0; }
  .details p { margin: 0.5rem 0; font-size: 1rem; line-height: 1.5; }
  .details strong { display: inline-block; min-width: 150px; color: #4a5568; }
  .details code { background-color: #e2e8f0; padding: 0.2rem 0.4rem; border-radius: 0.25rem; font-family: Consolas, Menlo, monospace; font-size: 0.9em; }
  .checklist { margin: 0.5rem 0 0 1rem; padding: 0; list-style: none; font-size: 0.95rem; }
"#;

/// Minimal escaping for text interpolated into the report.
fn esc(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Filename for a downloadable report over the given jobs.
///
/// A single job is named after its work order number; a multi-job report
/// encodes the job count.
pub fn report_filename(jobs: &[SubmittedJobData]) -> String {
    match jobs {
        [only] => format!(
            "completed-job-{}.html",
            only.work_order.work_order_number.to_lowercase()
        ),
        _ => format!("completed-jobs-report-{}-jobs.html", jobs.len()),
    }
}

/// Render the self-contained job-card fragment for one job.
pub fn render_job_fragment(job: &SubmittedJobData) -> String {
    let checklist = job
        .completed_checklist
        .iter()
        .map(|item| format!("<li>[x] {}</li>", esc(&item.prompt)))
        .collect::<Vec<_>>()
        .join("\n            ");

    let financials = match &job.financials {
        Some(fin) => format!(
            "<p><strong>Financial Report:</strong> <code>{}</code> — labor ${:.2} + material ${:.2} = ${:.2}</p>",
            esc(&fin.report_id),
            fin.labor_cost,
            fin.material_cost,
            fin.total_cost
        ),
        None => String::new(),
    };

    let verified = if job.material_verified {
        "Verified against BOM"
    } else {
        "NOT verified"
    };

    format!(
        r#"<div class="job-card">
          <h2>Work Order: {wo}</h2>
          <div class="details">
            <p><strong>Task:</strong> {task}</p>
            <p><strong>Material ID:</strong> <code>{material}</code> ({verified})</p>
            <p><strong>Planned Location:</strong> {location}</p>
            <p><strong>GPS Coordinates:</strong> {gps}</p>
            <p><strong>Submitted:</strong> {date}</p>
            <p><strong>Inspection:</strong> {inspection} | <strong>GIS:</strong> {gis} | <strong>Financial:</strong> {financial}</p>
            {financials}
          </div>
          <ul class="checklist">
            {checklist}
          </ul>
          <img src="{photo}" alt="Installation photo for work order {wo}">
        </div>"#,
        wo = esc(&job.work_order.work_order_number),
        task = esc(&job.work_order.task),
        material = esc(&job.material_id),
        verified = verified,
        location = esc(&job.work_order.location),
        gps = esc(&job.gps_coords),
        date = esc(&job.submission_date),
        inspection = job.inspection_status.label(),
        gis = job.gis_status.label(),
        financial = job.financial_status.label(),
        financials = financials,
        checklist = checklist,
        photo = job.photo_data,
    )
}

/// Render the full styled report document, newest submission first.
pub fn render_report(jobs: &[SubmittedJobData]) -> String {
    let cards = jobs
        .iter()
        .rev()
        .map(render_job_fragment)
        .collect::<Vec<_>>()
        .join("\n          ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Completed Jobs Report</title>
  <style>{css}</style>
</head>
<body>
  <div class="container">
    <h1>Completed Jobs Report</h1>
          {cards}
  </div>
</body>
</html>"#,
        css = REPORT_CSS,
        cards = cards,
    )
}

/// Per-job fragments paired with instance ids, for attaching back onto jobs.
pub fn fragments_for(jobs: &[SubmittedJobData]) -> Vec<(Uuid, String)> {
    jobs.iter()
        .map(|job| (job.instance_id, render_job_fragment(job)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FieldSubmission;
    use crate::submission::SubmittedJobData;
    use crate::workorder::mock_work_orders;

    fn job_for(catalog_idx: usize) -> SubmittedJobData {
        let wo = mock_work_orders()[catalog_idx].clone();
        let mut checklist = wo.safety_checklist.clone();
        for item in &mut checklist {
            item.completed = true;
        }
        SubmittedJobData::from_submission(FieldSubmission {
            material_id: wo.bill_of_materials[0].item_id.clone(),
            material_verified: true,
            work_order: wo,
            completed_checklist: checklist,
            gps_coords: "40.712800° N, 74.006000° W".into(),
            photo_data: "data:image/bmp;base64,QUJD".into(),
        })
    }

    #[test]
    fn test_single_job_filename_uses_work_order_number() {
        let jobs = vec![job_for(0)];
        assert_eq!(report_filename(&jobs), "completed-job-gas-main-2024-001.html");
    }

    #[test]
    fn test_multi_job_filename_encodes_count() {
        let jobs = vec![job_for(0), job_for(1), job_for(2)];
        assert_eq!(report_filename(&jobs), "completed-jobs-report-3-jobs.html");
    }

    #[test]
    fn test_fragment_contains_job_facts() {
        let job = job_for(0);
        let html = render_job_fragment(&job);
        assert!(html.contains("GAS-MAIN-2024-001"));
        assert!(html.contains("GASPIPE-HDPE-4IN"));
        assert!(html.contains("Verified against BOM"));
        assert!(html.contains("Gas detectors calibrated and active?"));
        assert!(html.contains(&job.photo_data));
    }

    #[test]
    fn test_report_lists_newest_first() {
        let jobs = vec![job_for(0), job_for(1)];
        let html = render_report(&jobs);
        let first = html.find("ELEC-TR-2024-002").unwrap();
        let second = html.find("GAS-MAIN-2024-001").unwrap();
        assert!(first < second, "newest submission should come first");
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_fragments_pair_with_instance_ids() {
        let jobs = vec![job_for(0), job_for(2)];
        let fragments = fragments_for(&jobs);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].0, jobs[0].instance_id);
        assert!(fragments[1].1.contains("WATER-SVC-2024-003"));
    }

    #[test]
    fn test_text_fields_are_escaped() {
        let mut job = job_for(0);
        job.material_id = "<script>alert(1)</script>".into();
        let html = render_job_fragment(&job);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
