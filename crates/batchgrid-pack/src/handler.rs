//! Source of the submit-job handler shipped in every shim bundle.
//!
//! The handler is configuration-free: everything it needs comes from the
//! environment set on the replacement function.

pub const SUBMIT_JOB_HANDLER: &str = r#"'use strict';
// Generated by batchgrid. Submits the triggering event as a batch job.

const AWS = require('aws-sdk');
const batch = new AWS.Batch();

function pad(n) {
  return n < 10 ? `0${n}` : `${n}`;
}

function timestamp(now) {
  return [
    now.getUTCFullYear(),
    pad(now.getUTCMonth() + 1),
    pad(now.getUTCDate()),
    pad(now.getUTCHours()),
    pad(now.getUTCMinutes()),
    pad(now.getUTCSeconds()),
  ].join('-');
}

module.exports.schedule = async (event) => {
  if (process.env.EVENT_LOGGING_ENABLED === 'true') {
    console.log(`Received event: ${JSON.stringify(event, null, 2)}`);
  }

  const params = {
    jobDefinition: process.env.JOB_DEFINITION_ARN,
    jobName: `${process.env.FUNCTION_NAME}-${timestamp(new Date())}`.slice(0, 128),
    jobQueue: process.env.JOB_QUEUE_ARN,
    parameters: { event: JSON.stringify(event) },
  };
  console.log(`Submitting job ${params.jobName} to ${params.jobQueue}`);

  try {
    const data = await batch.submitJob(params).promise();
    console.log(`Submitted job: ${JSON.stringify(data)}`);
    return { statusCode: 200, body: JSON.stringify({ data }) };
  } catch (err) {
    console.log(`Error submitting job: ${err}`, err.stack);
    return { statusCode: 500, body: JSON.stringify({ error: err.message }) };
  }
};
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_reads_every_wired_variable() {
        for var in [
            "EVENT_LOGGING_ENABLED",
            "JOB_DEFINITION_ARN",
            "FUNCTION_NAME",
            "JOB_QUEUE_ARN",
        ] {
            assert!(
                SUBMIT_JOB_HANDLER.contains(&format!("process.env.{var}")),
                "handler does not read {var}"
            );
        }
    }

    #[test]
    fn handler_exports_schedule_and_forwards_event() {
        assert!(SUBMIT_JOB_HANDLER.contains("module.exports.schedule"));
        assert!(SUBMIT_JOB_HANDLER.contains("parameters: { event: JSON.stringify(event) }"));
    }
}
