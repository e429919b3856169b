//! Role synthesizer: IAM roles and the instance profile.
//!
//! Global roles are built once per run. The job execution role is built per
//! annotated function; its policy is the concatenation of provider and
//! function statements, never an override of one by the other.

use serde_json::{Value, json};

use crate::graph::ResourceDefinition;
use crate::merge::concat_statements;
use crate::naming::{JOB_ROLE_PREFIX, LogicalId, ServiceNames};

pub const POLICY_VERSION: &str = "2012-10-17";

const ROLE_TYPE: &str = "AWS::IAM::Role";
const PROFILE_TYPE: &str = "AWS::IAM::InstanceProfile";

const BATCH_PRINCIPAL: &str = "batch.amazonaws.com";
const EC2_PRINCIPAL: &str = "ec2.amazonaws.com";
const SPOT_FLEET_PRINCIPAL: &str = "spotfleet.amazonaws.com";
const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
const LAMBDA_PRINCIPAL: &str = "lambda.amazonaws.com";

const BATCH_SERVICE_POLICY: &str = "arn:aws:iam::aws:policy/service-role/AWSBatchServiceRole";
const EC2_CONTAINER_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonEC2ContainerServiceforEC2Role";
const SPOT_FLEET_POLICY: &str = "arn:aws:iam::aws:policy/service-role/AmazonEC2SpotFleetRole";

/// Trust policy letting `principal` assume the role.
fn assume_role_policy(principal: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": principal },
            "Action": "sts:AssumeRole"
        }]
    })
}

fn role(name: String, principal: &str, managed_policies: &[&str]) -> Value {
    let mut properties = json!({
        "RoleName": name,
        "Path": "/",
        "AssumeRolePolicyDocument": assume_role_policy(principal),
    });
    if !managed_policies.is_empty() {
        properties["ManagedPolicyArns"] = json!(managed_policies);
    }
    properties
}

/// Role assumed by the batch service to manage the compute environment.
pub fn service_role(names: &ServiceNames<'_>) -> ResourceDefinition {
    ResourceDefinition::new(
        ROLE_TYPE,
        role(
            names.role_name("BatchServiceRole", None),
            BATCH_PRINCIPAL,
            &[BATCH_SERVICE_POLICY],
        ),
    )
}

/// Role for the container instances of the compute environment.
pub fn instance_role(names: &ServiceNames<'_>) -> ResourceDefinition {
    ResourceDefinition::new(
        ROLE_TYPE,
        role(
            names.role_name("BatchInstanceRole", None),
            EC2_PRINCIPAL,
            &[EC2_CONTAINER_POLICY],
        ),
    )
}

/// Profile wrapping the instance role; the compute environment takes its ARN.
pub fn instance_profile(instance_role: &LogicalId) -> ResourceDefinition {
    ResourceDefinition::new(
        PROFILE_TYPE,
        json!({
            "Path": "/",
            "Roles": [instance_role.reference()]
        }),
    )
}

pub fn spot_fleet_role(names: &ServiceNames<'_>) -> ResourceDefinition {
    ResourceDefinition::new(
        ROLE_TYPE,
        role(
            names.role_name("BatchSpotFleetRole", None),
            SPOT_FLEET_PRINCIPAL,
            &[SPOT_FLEET_POLICY],
        ),
    )
}

/// Role the container of `function`'s job runs as.
///
/// With no statements at either level the role carries no inline policy.
pub fn job_execution_role(
    names: &ServiceNames<'_>,
    function: &str,
    provider_statements: &[Value],
    function_statements: &[Value],
) -> ResourceDefinition {
    let mut properties = role(
        names.role_name(JOB_ROLE_PREFIX, Some(function)),
        ECS_TASKS_PRINCIPAL,
        &[],
    );
    let statements = concat_statements(provider_statements, function_statements);
    if !statements.is_empty() {
        properties["Policies"] = json!([{
            "PolicyName": "batch-job-execution-policies",
            "PolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": statements
            }
        }]);
    }
    ResourceDefinition::new(ROLE_TYPE, properties)
}

/// Role of the submit-job shims: may submit jobs to our queue using this
/// service's job definitions.
pub fn schedule_execution_role(names: &ServiceNames<'_>, queue: &LogicalId) -> ResourceDefinition {
    let mut properties = role(
        names.role_name("BatchScheduleRole", None),
        LAMBDA_PRINCIPAL,
        &[],
    );
    properties["Policies"] = json!([{
        "PolicyName": "lambda-schedule-execution-policies",
        "PolicyDocument": {
            "Version": POLICY_VERSION,
            "Statement": [{
                "Effect": "Allow",
                "Action": ["batch:SubmitJob"],
                "Resource": [
                    queue.reference(),
                    {
                        "Fn::Sub": format!(
                            "arn:aws:batch:${{AWS::Region}}:${{AWS::AccountId}}:job-definition/{}-{}-*",
                            names.service, names.stage
                        )
                    }
                ]
            }]
        }
    }]);
    ResourceDefinition::new(ROLE_TYPE, properties)
}
