use crate::db::models::UploadRecord;

pub const NO_DISEASE: &str = "None";

/// Per-label statistics over one identity's uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub uploads: Vec<UploadRecord>,
    /// Per-label totals, in the order labels were first seen.
    pub disease_counts: Vec<(String, usize)>,
    pub total_images: usize,
    pub disease_count: usize,
    pub most_common_disease: String,
    pub disease_types: Vec<String>,
}

impl DashboardStats {
    pub fn empty() -> Self {
        Self::from_records(Vec::new())
    }

    /// `uploads` keeps the caller's ordering; labels are listed in the order
    /// first seen.
    pub fn from_records(uploads: Vec<UploadRecord>) -> Self {
        let mut disease_counts: Vec<(String, usize)> = Vec::new();
        for record in &uploads {
            match disease_counts
                .iter_mut()
                .find(|(label, _)| *label == record.disease_type)
            {
                Some((_, count)) => *count += 1,
                None => disease_counts.push((record.disease_type.clone(), 1)),
            }
        }
        let disease_types: Vec<String> = disease_counts
            .iter()
            .map(|(label, _)| label.clone())
            .collect();

        let total_images = uploads.len();
        let disease_count = disease_counts
            .iter()
            .filter(|(label, _)| !is_healthy_label(label))
            .map(|(_, count)| count)
            .sum();

        // Strictly greater keeps the first-seen label on ties.
        let mut most_common: Option<(&str, usize)> = None;
        for (label, count) in disease_counts
            .iter()
            .filter(|(label, _)| !is_healthy_label(label))
        {
            if most_common.is_none_or(|(_, best)| *count > best) {
                most_common = Some((label.as_str(), *count));
            }
        }
        let most_common_disease = most_common
            .map(|(label, _)| label.to_string())
            .unwrap_or_else(|| NO_DISEASE.to_string());

        Self {
            uploads,
            disease_counts,
            total_images,
            disease_count,
            most_common_disease,
            disease_types,
        }
    }
}

fn is_healthy_label(label: &str) -> bool {
    label.to_lowercase().contains("healthy")
}
