use crate::models::CloudProvider;

/// Equivalent regions, one row per location: (AWS, Azure, GCP)
const REGIONS: &[[&str; 3]] = &[
    ["us-east-1", "eastus", "us-east1"],
    ["us-west-2", "westus2", "us-west1"],
    ["eu-west-1", "westeurope", "europe-west1"],
    ["eu-central-1", "germanywestcentral", "europe-west3"],
    ["ap-southeast-1", "southeastasia", "asia-southeast1"],
];

fn column(provider: CloudProvider) -> usize {
    match provider {
        CloudProvider::Aws => 0,
        CloudProvider::Azure => 1,
        CloudProvider::Gcp => 2,
    }
}

/// Region code of `provider` equivalent to `region`.
///
/// `region` may be any provider's code. Unknown regions pass through
/// unchanged so catalogs can hold locations missing from the table.
pub fn provider_region(provider: CloudProvider, region: &str) -> String {
    let region = region.trim();
    REGIONS
        .iter()
        .find(|row| row.iter().any(|code| code.eq_ignore_ascii_case(region)))
        .map(|row| row[column(provider)].to_string())
        .unwrap_or_else(|| region.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_region_maps_to_each_provider() {
        assert_eq!(provider_region(CloudProvider::Aws, "us-east-1"), "us-east-1");
        assert_eq!(provider_region(CloudProvider::Azure, "us-east-1"), "eastus");
        assert_eq!(provider_region(CloudProvider::Gcp, "us-east-1"), "us-east1");
    }

    #[test]
    fn test_native_codes_are_accepted() {
        assert_eq!(provider_region(CloudProvider::Aws, "WestEurope"), "eu-west-1");
        assert_eq!(
            provider_region(CloudProvider::Azure, "asia-southeast1"),
            "southeastasia"
        );
    }

    #[test]
    fn test_unknown_region_passes_through() {
        assert_eq!(
            provider_region(CloudProvider::Gcp, "mars-north-1"),
            "mars-north-1"
        );
    }
}
