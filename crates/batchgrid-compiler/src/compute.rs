//! Compute topology synthesizer: compute environment, job queue, and the
//! container repository the job image is pushed to.

use batchgrid_core::ComputePoolOverrides;
use serde_json::{Value, json};

use crate::graph::ResourceDefinition;
use crate::merge::override_merge;
use crate::naming::{LogicalId, ServiceNames};

/// Bid percentage used for spot pools that do not set one: always accept
/// the market price.
pub const DEFAULT_SPOT_BID_PERCENTAGE: u32 = 100;

pub const JOB_QUEUE_PRIORITY: u32 = 1;

/// Untagged images are expired after this many days.
const UNTAGGED_IMAGE_EXPIRY_DAYS: u32 = 1;

/// Identifiers the compute environment points at.
#[derive(Debug, Clone, Copy)]
pub struct ComputeRoles<'a> {
    pub service_role: &'a LogicalId,
    pub instance_profile: &'a LogicalId,
    pub spot_fleet_role: &'a LogicalId,
}

/// Baseline compute resources before provider overrides.
fn baseline_compute_resources(names: &ServiceNames<'_>, roles: ComputeRoles<'_>) -> Value {
    json!({
        "Type": "EC2",
        "InstanceRole": roles.instance_profile.arn(),
        "SpotIamFleetRole": roles.spot_fleet_role.arn(),
        "InstanceTypes": ["c5.large"],
        "MinvCpus": 0,
        "MaxvCpus": 2,
        "Tags": { "Name": names.instance_tag() }
    })
}

/// Effective compute resources: baseline, overrides, then the spot default.
pub fn compute_resources(
    names: &ServiceNames<'_>,
    roles: ComputeRoles<'_>,
    overrides: Option<&ComputePoolOverrides>,
) -> Value {
    let mut resources = baseline_compute_resources(names, roles);
    if let Some(overrides) = overrides {
        override_merge(&mut resources, &Value::Object(overrides.to_fields()));
    }
    if resources["Type"] == "SPOT" && resources.get("BidPercentage").is_none() {
        resources["BidPercentage"] = json!(DEFAULT_SPOT_BID_PERCENTAGE);
    }
    resources
}

/// Managed compute environment. `suffix` goes into the physical name.
pub fn compute_environment(
    names: &ServiceNames<'_>,
    roles: ComputeRoles<'_>,
    overrides: Option<&ComputePoolOverrides>,
    suffix: u32,
) -> ResourceDefinition {
    ResourceDefinition::new(
        "AWS::Batch::ComputeEnvironment",
        json!({
            "ComputeEnvironmentName": names.compute_environment_name(suffix),
            "ServiceRole": roles.service_role.arn(),
            "Type": "MANAGED",
            "ComputeResources": compute_resources(names, roles, overrides)
        }),
    )
}

pub fn job_queue(names: &ServiceNames<'_>, environment: &LogicalId) -> ResourceDefinition {
    ResourceDefinition::new(
        "AWS::Batch::JobQueue",
        json!({
            "JobQueueName": names.job_queue_name(),
            "Priority": JOB_QUEUE_PRIORITY,
            "ComputeEnvironmentOrder": [{
                "ComputeEnvironment": environment.reference(),
                "Order": 1
            }]
        }),
    )
}

pub fn container_repository(names: &ServiceNames<'_>) -> ResourceDefinition {
    let lifecycle = json!({
        "rules": [{
            "rulePriority": 1,
            "description": "Remove untagged images",
            "selection": {
                "tagStatus": "untagged",
                "countType": "sinceImagePushed",
                "countUnit": "days",
                "countNumber": UNTAGGED_IMAGE_EXPIRY_DAYS
            },
            "action": { "type": "expire" }
        }]
    });
    ResourceDefinition::new(
        "AWS::ECR::Repository",
        json!({
            "RepositoryName": names.repository_name(),
            "LifecyclePolicy": { "LifecyclePolicyText": lifecycle.to_string() }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{ResourceKind, derive};

    fn names() -> ServiceNames<'static> {
        ServiceNames {
            service: "thumbs",
            stage: "dev",
            region: "us-east-1",
        }
    }

    struct Ids {
        service: LogicalId,
        profile: LogicalId,
        spot: LogicalId,
    }

    impl Ids {
        fn new() -> Self {
            Self {
                service: derive(ResourceKind::ServiceRole, None),
                profile: derive(ResourceKind::InstanceProfile, None),
                spot: derive(ResourceKind::SpotFleetRole, None),
            }
        }

        fn roles(&self) -> ComputeRoles<'_> {
            ComputeRoles {
                service_role: &self.service,
                instance_profile: &self.profile,
                spot_fleet_role: &self.spot,
            }
        }
    }

    #[test]
    fn baseline_without_overrides() {
        let ids = Ids::new();
        let resources = compute_resources(&names(), ids.roles(), None);
        assert_eq!(resources["Type"], "EC2");
        assert_eq!(resources["InstanceTypes"], json!(["c5.large"]));
        assert_eq!(resources["MaxvCpus"], 2);
        assert_eq!(
            resources["InstanceRole"],
            json!({ "Fn::GetAtt": ["IamProfileBatchInstanceManagement", "Arn"] })
        );
        assert!(resources.get("BidPercentage").is_none());
    }

    #[test]
    fn spot_defaults_bid_percentage() {
        let ids = Ids::new();
        let overrides = ComputePoolOverrides {
            pool_type: Some("SPOT".into()),
            ..Default::default()
        };
        let resources = compute_resources(&names(), ids.roles(), Some(&overrides));
        assert_eq!(resources["BidPercentage"], 100);
    }

    #[test]
    fn spot_keeps_explicit_bid_percentage() {
        let ids = Ids::new();
        let overrides = ComputePoolOverrides {
            pool_type: Some("SPOT".into()),
            bid_percentage: Some(40),
            ..Default::default()
        };
        let resources = compute_resources(&names(), ids.roles(), Some(&overrides));
        assert_eq!(resources["BidPercentage"], 40);
    }

    #[test]
    fn overrides_merge_over_baseline() {
        let ids = Ids::new();
        let overrides = ComputePoolOverrides {
            maxv_cpus: Some(64),
            subnets: Some(vec![json!("subnet-1")]),
            security_group_ids: Some(vec![json!("sg-1")]),
            tags: Some(
                json!({ "Team": "media" })
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            ),
            ..Default::default()
        };
        let resources = compute_resources(&names(), ids.roles(), Some(&overrides));
        assert_eq!(resources["MaxvCpus"], 64);
        assert_eq!(resources["MinvCpus"], 0);
        assert_eq!(resources["Subnets"], json!(["subnet-1"]));
        assert_eq!(resources["Tags"]["Team"], "media");
        assert_eq!(resources["Tags"]["Name"], "AWS Batch Instance - thumbs-dev");
    }

    #[test]
    fn environment_and_queue_wiring() {
        let ids = Ids::new();
        let env = compute_environment(&names(), ids.roles(), None, 7);
        assert_eq!(
            env.properties["ComputeEnvironmentName"],
            "thumbs-dev-ComputeEnvironment-7"
        );
        assert_eq!(
            env.properties["ServiceRole"],
            json!({ "Fn::GetAtt": ["IamRoleBatchService", "Arn"] })
        );

        let env_id = derive(ResourceKind::ComputeEnvironment, None);
        let queue = job_queue(&names(), &env_id);
        assert_eq!(queue.properties["Priority"], 1);
        assert_eq!(
            queue.properties["ComputeEnvironmentOrder"][0]["ComputeEnvironment"],
            json!({ "Ref": "BatchComputeEnvironment" })
        );
    }

    #[test]
    fn repository_expires_untagged_images() {
        let repo = container_repository(&names());
        assert_eq!(repo.properties["RepositoryName"], "thumbs-dev");
        let text = repo.properties["LifecyclePolicy"]["LifecyclePolicyText"]
            .as_str()
            .unwrap();
        let policy: Value = serde_json::from_str(text).unwrap();
        assert_eq!(policy["rules"][0]["selection"]["tagStatus"], "untagged");
    }
}
