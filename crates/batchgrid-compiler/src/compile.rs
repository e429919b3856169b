//! Compilation driver.
//!
//! One run: validate the provider, synthesize the global resources once,
//! then walk the functions in order. Annotated functions get an execution
//! role, a job definition, and a submit-job replacement. The graph is only
//! returned if every function compiled.

use batchgrid_core::{
    ArtifactRequest, CompileResult, FunctionSpec, JobAnnotation, JobKind, ServiceConfig,
};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::compute::{self, ComputeRoles};
use crate::env::{self, EnvironmentTiers};
use crate::graph::{GraphBuilder, ResourceGraph};
use crate::job_definition::{self, JobDefinitionInputs};
use crate::naming::{JOB_ROLE_PREFIX, LogicalId, Namer, ResourceKind, ServiceNames};
use crate::phase::{FunctionPhase, PhaseTracker};
use crate::roles;
use crate::shim::{self, ShimWiring};

/// Exclusive upper bound of the compute environment name suffix.
pub const POOL_SUFFIX_RANGE: u32 = 1_000_000;

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Pin the compute environment name suffix. When `None` a random suffix
    /// is drawn, so every run names a fresh compute environment and the
    /// deployment replaces the pool instead of updating it in place.
    pub pool_suffix: Option<u32>,
}

impl CompileOptions {
    pub fn with_pool_suffix(suffix: u32) -> Self {
        Self {
            pool_suffix: Some(suffix),
        }
    }

    fn resolve_pool_suffix(&self) -> u32 {
        self.pool_suffix
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..POOL_SUFFIX_RANGE))
    }
}

/// A function whose definition must be swapped for `replacement`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Substitution {
    pub original: String,
    pub replacement: FunctionSpec,
}

/// Final phase of one input function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionReport {
    pub name: String,
    pub phase: FunctionPhase,
}

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub resources: ResourceGraph,
    pub substitutions: Vec<Substitution>,
    pub artifacts: Vec<ArtifactRequest>,
    pub functions: Vec<FunctionReport>,
    /// Suffix used in the compute environment name.
    pub pool_suffix: u32,
}

impl CompileOutput {
    pub fn substitution(&self, function: &str) -> Option<&FunctionSpec> {
        self.substitutions
            .iter()
            .find(|s| s.original == function)
            .map(|s| &s.replacement)
    }
}

/// Identifiers of the resources every function is wired to.
struct GlobalIds {
    job_queue: LogicalId,
    schedule_role: LogicalId,
}

/// Compile a service into resources and substitutions.
pub fn compile(config: &ServiceConfig, options: &CompileOptions) -> CompileResult<CompileOutput> {
    config.validate()?;

    let names = ServiceNames {
        service: &config.service,
        stage: &config.provider.stage,
        region: &config.provider.region,
    };
    let pool_suffix = options.resolve_pool_suffix();
    info!(
        service = names.service,
        stage = names.stage,
        functions = config.functions.len(),
        "compiling batch resources"
    );

    let mut namer = Namer::new();
    let mut graph = GraphBuilder::new();
    let globals = synthesize_globals(config, &names, pool_suffix, &mut namer, &mut graph)?;

    let mut substitutions = Vec::new();
    let mut artifacts = Vec::new();
    let mut reports = Vec::with_capacity(config.functions.len());

    for function in &config.functions {
        let phase = match &function.job {
            JobKind::Plain => {
                debug!(function = %function.name, "function is not batch-annotated");
                FunctionPhase::Unannotated
            }
            JobKind::Annotated(annotation) => {
                let mut tracker = PhaseTracker::annotated(&function.name);
                let step = FunctionStep {
                    config,
                    names: &names,
                    globals: &globals,
                    function,
                    annotation,
                };
                match step.run(&mut tracker, &mut namer, &mut graph) {
                    Ok(shim) => {
                        info!(function = %function.name, "substituted with submit-job shim");
                        substitutions.push(Substitution {
                            original: function.name.clone(),
                            replacement: shim.replacement,
                        });
                        artifacts.push(shim.artifact);
                        tracker.phase()
                    }
                    Err(e) => {
                        tracker.fail();
                        return Err(e);
                    }
                }
            }
        };
        reports.push(FunctionReport {
            name: function.name.clone(),
            phase,
        });
    }

    let resources = graph.finalize();
    info!(
        resources = resources.len(),
        substitutions = substitutions.len(),
        "compilation finished"
    );
    Ok(CompileOutput {
        resources,
        substitutions,
        artifacts,
        functions: reports,
        pool_suffix,
    })
}

/// Build the resources shared by all functions. Called exactly once per run.
fn synthesize_globals(
    config: &ServiceConfig,
    names: &ServiceNames<'_>,
    pool_suffix: u32,
    namer: &mut Namer,
    graph: &mut GraphBuilder,
) -> CompileResult<GlobalIds> {
    let service_role = namer.claim(ResourceKind::ServiceRole, None)?;
    let instance_role = namer.claim(ResourceKind::InstanceRole, None)?;
    let instance_profile = namer.claim(ResourceKind::InstanceProfile, None)?;
    let spot_fleet_role = namer.claim(ResourceKind::SpotFleetRole, None)?;
    let compute_environment = namer.claim(ResourceKind::ComputeEnvironment, None)?;
    let job_queue = namer.claim(ResourceKind::JobQueue, None)?;
    let schedule_role = namer.claim(ResourceKind::ScheduleExecutionRole, None)?;
    let repository = namer.claim(ResourceKind::ContainerRepository, None)?;

    graph.insert(service_role.clone(), roles::service_role(names))?;
    graph.insert(instance_role.clone(), roles::instance_role(names))?;
    graph.insert(instance_profile.clone(), roles::instance_profile(&instance_role))?;
    graph.insert(spot_fleet_role.clone(), roles::spot_fleet_role(names))?;
    graph.insert(
        schedule_role.clone(),
        roles::schedule_execution_role(names, &job_queue),
    )?;
    graph.insert(repository, compute::container_repository(names))?;

    debug!(suffix = pool_suffix, "compute environment name suffix");
    let compute_roles = ComputeRoles {
        service_role: &service_role,
        instance_profile: &instance_profile,
        spot_fleet_role: &spot_fleet_role,
    };
    graph.insert(
        compute_environment.clone(),
        compute::compute_environment(
            names,
            compute_roles,
            config.provider.batch.as_ref(),
            pool_suffix,
        ),
    )?;
    graph.insert(
        job_queue.clone(),
        compute::job_queue(names, &compute_environment),
    )?;

    Ok(GlobalIds {
        job_queue,
        schedule_role,
    })
}

/// Compilation of a single annotated function.
struct FunctionStep<'a> {
    config: &'a ServiceConfig,
    names: &'a ServiceNames<'a>,
    globals: &'a GlobalIds,
    function: &'a FunctionSpec,
    annotation: &'a JobAnnotation,
}

impl FunctionStep<'_> {
    fn run(
        &self,
        tracker: &mut PhaseTracker<'_>,
        namer: &mut Namer,
        graph: &mut GraphBuilder,
    ) -> CompileResult<shim::Shim> {
        let name = self.function.name.as_str();

        // Annotated → Validated
        job_definition::resolve_command(self.function, self.annotation)?;
        let defaults =
            job_definition::default_environment(self.function, self.annotation, self.names.region);
        let environment = env::merge(
            name,
            EnvironmentTiers {
                defaults: &defaults,
                provider: &self.config.provider.environment,
                function: &self.function.environment,
                job: &self.annotation.container_properties.environment,
            },
        )?;
        let execution_role = namer.claim(ResourceKind::JobExecutionRole, Some(name))?;
        let job_definition_id = namer.claim(ResourceKind::JobDefinition, Some(name))?;
        namer.claim_physical(
            ResourceKind::JobExecutionRole,
            name,
            self.names.role_name(JOB_ROLE_PREFIX, Some(name)),
        )?;
        namer.claim_physical(
            ResourceKind::JobDefinition,
            name,
            self.names.job_definition_name(name),
        )?;
        tracker.advance();

        // Validated → RoleGenerated
        graph.insert(
            execution_role.clone(),
            roles::job_execution_role(
                self.names,
                name,
                &self.config.provider.iam_role_statements,
                &self.function.iam_role_statements,
            ),
        )?;
        tracker.advance();

        // RoleGenerated → JobDefinitionGenerated
        let definition = job_definition::job_definition(JobDefinitionInputs {
            names: self.names,
            function: self.function,
            annotation: self.annotation,
            environment: &environment,
            execution_role: &execution_role,
        })?;
        graph.insert(job_definition_id.clone(), definition)?;
        tracker.advance();

        // JobDefinitionGenerated → ShimSubstituted
        let shim = shim::generate(
            self.function,
            self.annotation,
            ShimWiring {
                job_definition: &job_definition_id,
                job_queue: &self.globals.job_queue,
                schedule_role: &self.globals.schedule_role,
            },
        );
        tracker.advance();

        Ok(shim)
    }
}
