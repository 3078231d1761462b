//! AWS region table.

/// A region GameKit knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwsRegion {
    pub key: &'static str,
    pub description: &'static str,
    pub supported: bool,
    short_code: &'static str,
}

const fn region(
    key: &'static str,
    description: &'static str,
    supported: bool,
    short_code: &'static str,
) -> AwsRegion {
    AwsRegion {
        key,
        description,
        supported,
        short_code,
    }
}

/// All regions, in the order they are presented to users.
pub const REGIONS: [AwsRegion; 21] = [
    region("us-east-1", "us-east-1: US East (N. Virginia)", true, "use1"),
    region("us-east-2", "us-east-2: US East (Ohio)", true, "use2"),
    region("us-west-1", "us-west-1: US West (N. California)", true, "usw1"),
    region("us-west-2", "us-west-2: US West (Oregon)", true, "usw2"),
    region("af-south-1", "af-south-1: Africa (Cape Town)", false, "afs1"),
    region("ap-east-1", "ap-east-1: Asia Pacific (Hong Kong)", false, "ape1"),
    region("ap-south-1", "ap-south-1: Asia Pacific (Mumbai)", true, "aps1"),
    region("ap-northeast-3", "ap-northeast-3: Asia Pacific (Osaka)", false, "apne3"),
    region("ap-northeast-2", "ap-northeast-2: Asia Pacific (Seoul)", true, "apne2"),
    region("ap-southeast-1", "ap-southeast-1: Asia Pacific (Singapore)", true, "apse1"),
    region("ap-southeast-2", "ap-southeast-2: Asia Pacific (Sydney)", true, "apse2"),
    region("ap-northeast-1", "ap-northeast-1: Asia Pacific (Tokyo)", true, "apne1"),
    region("ca-central-1", "ca-central-1: Canada (Central)", true, "cac1"),
    region("eu-central-1", "eu-central-1: Europe (Frankfurt)", true, "euc1"),
    region("eu-west-1", "eu-west-1: Europe (Ireland)", true, "euw1"),
    region("eu-west-2", "eu-west-2: Europe (London)", true, "euw2"),
    region("eu-south-1", "eu-south-1: Europe (Milan)", false, "eus1"),
    region("eu-west-3", "eu-west-3: Europe (Paris)", true, "euw3"),
    region("eu-north-1", "eu-north-1: Europe (Stockholm)", true, "eun1"),
    region("me-south-1", "me-south-1: Middle East (Bahrain)", true, "mes1"),
    region("sa-east-1", "sa-east-1: South America (Sao Paulo)", true, "sae1"),
];

impl AwsRegion {
    /// Looks up a region by key, e.g. `us-west-2`.
    pub fn find(key: &str) -> Option<&'static AwsRegion> {
        REGIONS.iter().find(|r| r.key == key)
    }

    /// Short code used in resource names. Unsupported regions have none.
    pub fn short_code(&self) -> Option<&'static str> {
        self.supported.then_some(self.short_code)
    }
}

/// Maps a region key to its short code, if the region is known and supported.
pub fn short_region_code(key: &str) -> Option<&'static str> {
    AwsRegion::find(key).and_then(AwsRegion::short_code)
}
