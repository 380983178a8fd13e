//! Bucket policy documents and their evaluation.
//!
//! Policies use the AWS JSON shape:
//!
//! ```json
//! {
//!   "Version": "2012-10-17",
//!   "Statement": [{
//!     "Sid": "PublicRead",
//!     "Effect": "Allow",
//!     "Principal": "*",
//!     "Action": "s3:GetObject",
//!     "Resource": "arn:aws:s3:::photos/*"
//!   }]
//! }
//! ```
//!
//! Evaluation is deny-by-default and an explicit `Deny` beats any `Allow`, so
//! statement order never changes the outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::S3ServiceError;
use crate::state::Principal;

/// Policy language version written by [`PolicyDocument::public_read`].
pub const POLICY_VERSION: &str = "2012-10-17";

/// Prefix of every S3 resource ARN.
pub const ARN_PREFIX: &str = "arn:aws:s3:::";

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// An action a policy can grant or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read an object (also HEAD).
    GetObject,
    /// Write an object, including every multipart step but abort.
    PutObject,
    /// Delete an object or version.
    DeleteObject,
    /// List a bucket's objects or uploads.
    ListBucket,
    /// Delete the bucket.
    DeleteBucket,
    /// Abort a multipart upload.
    AbortMultipartUpload,
    /// List the parts of an upload.
    ListMultipartUploadParts,
    /// Read the bucket policy.
    GetBucketPolicy,
    /// Replace the bucket policy.
    PutBucketPolicy,
    /// Remove the bucket policy.
    DeleteBucketPolicy,
    /// Read the versioning status.
    GetBucketVersioning,
    /// Change the versioning status.
    PutBucketVersioning,
}

impl Action {
    /// Every recognised action.
    pub const ALL: [Self; 12] = [
        Self::GetObject,
        Self::PutObject,
        Self::DeleteObject,
        Self::ListBucket,
        Self::DeleteBucket,
        Self::AbortMultipartUpload,
        Self::ListMultipartUploadParts,
        Self::GetBucketPolicy,
        Self::PutBucketPolicy,
        Self::DeleteBucketPolicy,
        Self::GetBucketVersioning,
        Self::PutBucketVersioning,
    ];

    /// The IAM action name, e.g. `s3:GetObject`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetObject => "s3:GetObject",
            Self::PutObject => "s3:PutObject",
            Self::DeleteObject => "s3:DeleteObject",
            Self::ListBucket => "s3:ListBucket",
            Self::DeleteBucket => "s3:DeleteBucket",
            Self::AbortMultipartUpload => "s3:AbortMultipartUpload",
            Self::ListMultipartUploadParts => "s3:ListMultipartUploadParts",
            Self::GetBucketPolicy => "s3:GetBucketPolicy",
            Self::PutBucketPolicy => "s3:PutBucketPolicy",
            Self::DeleteBucketPolicy => "s3:DeleteBucketPolicy",
            Self::GetBucketVersioning => "s3:GetBucketVersioning",
            Self::PutBucketVersioning => "s3:PutBucketVersioning",
        }
    }

    /// Whether the action targets an object (`arn:aws:s3:::bucket/key`)
    /// rather than the bucket itself.
    #[must_use]
    pub fn is_object_action(&self) -> bool {
        matches!(
            self,
            Self::GetObject
                | Self::PutObject
                | Self::DeleteObject
                | Self::AbortMultipartUpload
                | Self::ListMultipartUploadParts
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`Action`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct ParseActionError(String);

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseActionError(s.to_owned()))
    }
}

/// Build the ARN of a bucket, or of an object when `key` is given.
///
/// # Examples
///
/// ```
/// use s3lite_core::policy::resource_arn;
///
/// assert_eq!(resource_arn("photos", None), "arn:aws:s3:::photos");
/// assert_eq!(resource_arn("photos", Some("a/b.jpg")), "arn:aws:s3:::photos/a/b.jpg");
/// ```
#[must_use]
pub fn resource_arn(bucket: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("{ARN_PREFIX}{bucket}/{key}"),
        None => format!("{ARN_PREFIX}{bucket}"),
    }
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Grant.
    Allow,
    /// Refuse; overrides any grant.
    Deny,
}

/// The callers a statement applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PrincipalWire", into = "PrincipalWire")]
pub enum PrincipalPattern {
    /// `"*"`: everyone, anonymous included.
    Any,
    /// `{"AWS": ...}`: access key ids or IAM ARNs, with wildcards.
    Aws(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PrincipalWire {
    Wildcard(String),
    Aws {
        #[serde(rename = "AWS", deserialize_with = "one_or_many")]
        aws: Vec<String>,
    },
}

impl TryFrom<PrincipalWire> for PrincipalPattern {
    type Error = String;

    fn try_from(wire: PrincipalWire) -> Result<Self, Self::Error> {
        match wire {
            PrincipalWire::Wildcard(s) if s == "*" => Ok(Self::Any),
            PrincipalWire::Wildcard(s) => Err(format!("unsupported principal: {s}")),
            PrincipalWire::Aws { aws } if aws.is_empty() => {
                Err("principal AWS list must not be empty".to_owned())
            }
            PrincipalWire::Aws { aws } => Ok(Self::Aws(aws)),
        }
    }
}

impl From<PrincipalPattern> for PrincipalWire {
    fn from(pattern: PrincipalPattern) -> Self {
        match pattern {
            PrincipalPattern::Any => Self::Wildcard("*".to_owned()),
            PrincipalPattern::Aws(aws) => Self::Aws { aws },
        }
    }
}

impl PrincipalPattern {
    /// Whether `principal` is covered.
    #[must_use]
    pub fn matches(&self, principal: &Principal) -> bool {
        match self {
            Self::Any => true,
            Self::Aws(patterns) => patterns.iter().any(|p| {
                if p == "*" {
                    return true;
                }
                let Some(key) = principal.access_key() else {
                    return false;
                };
                if glob_match(p, key) {
                    return true;
                }
                p.starts_with("arn:")
                    && p.rsplit(['/', ':'])
                        .next()
                        .is_some_and(|segment| glob_match(segment, key))
            }),
        }
    }
}

/// A single policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    /// Optional statement id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Allow or Deny.
    pub effect: Effect,
    /// Callers covered.
    pub principal: PrincipalPattern,
    /// Action patterns (`s3:GetObject`, `s3:Get*`, `s3:*`).
    #[serde(deserialize_with = "one_or_many")]
    pub action: Vec<String>,
    /// Resource ARN patterns.
    #[serde(deserialize_with = "one_or_many")]
    pub resource: Vec<String>,
}

impl Statement {
    /// Whether this statement covers the request.
    #[must_use]
    pub fn matches(&self, principal: &Principal, action: Action, resource: &str) -> bool {
        self.principal.matches(principal)
            && self
                .action
                .iter()
                .any(|p| glob_match_ignore_case(p, action.as_str()))
            && self.resource.iter().any(|p| glob_match(p, resource))
    }

    fn validate(&self) -> Result<(), String> {
        if self.action.is_empty() {
            return Err("statement has no Action".to_owned());
        }
        if let Some(bad) = self
            .action
            .iter()
            .find(|a| *a != "*" && !a.to_ascii_lowercase().starts_with("s3:"))
        {
            return Err(format!("unsupported action: {bad}"));
        }
        if self.resource.is_empty() {
            return Err("statement has no Resource".to_owned());
        }
        if let Some(bad) = self
            .resource
            .iter()
            .find(|r| *r != "*" && !r.starts_with(ARN_PREFIX))
        {
            return Err(format!("invalid resource: {bad}"));
        }
        Ok(())
    }
}

/// A bucket policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Policy language version.
    #[serde(rename = "Version", default = "default_version")]
    pub version: String,
    /// Statements, in document order.
    #[serde(rename = "Statement", deserialize_with = "one_or_many")]
    pub statements: Vec<Statement>,
}

fn default_version() -> String {
    POLICY_VERSION.to_owned()
}

/// Outcome of evaluating a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// A matching statement allows the request and none denies it.
    Allow,
    /// A matching statement denies the request.
    ExplicitDeny,
    /// No statement matches.
    ImplicitDeny,
}

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The request may proceed.
    Allow,
    /// The request is refused.
    Deny,
}

impl From<PolicyDecision> for AccessDecision {
    fn from(decision: PolicyDecision) -> Self {
        match decision {
            PolicyDecision::Allow => Self::Allow,
            PolicyDecision::ExplicitDeny | PolicyDecision::ImplicitDeny => Self::Deny,
        }
    }
}

impl PolicyDocument {
    /// Parse and validate a JSON policy.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::MalformedPolicy`] for invalid JSON, unknown shapes,
    /// an empty statement list, or non-S3 actions and resources.
    pub fn parse(json: &str) -> Result<Self, S3ServiceError> {
        let doc: Self = serde_json::from_str(json).map_err(|e| S3ServiceError::MalformedPolicy {
            message: e.to_string(),
        })?;
        if doc.statements.is_empty() {
            return Err(S3ServiceError::MalformedPolicy {
                message: "policy has no statements".to_owned(),
            });
        }
        for statement in &doc.statements {
            statement
                .validate()
                .map_err(|message| S3ServiceError::MalformedPolicy { message })?;
        }
        Ok(doc)
    }

    /// Serialize back to JSON.
    pub fn to_json(&self) -> Result<String, S3ServiceError> {
        serde_json::to_string(self).map_err(|e| S3ServiceError::Internal(e.into()))
    }

    /// Anonymous read access to every object in `bucket`.
    ///
    /// # Examples
    ///
    /// ```
    /// use s3lite_core::policy::{Action, PolicyDecision, PolicyDocument};
    /// use s3lite_core::state::Principal;
    ///
    /// let policy = PolicyDocument::public_read("photos");
    /// let decision = policy.evaluate(
    ///     &Principal::Anonymous,
    ///     Action::GetObject,
    ///     "arn:aws:s3:::photos/cat.jpg",
    /// );
    /// assert_eq!(decision, PolicyDecision::Allow);
    /// ```
    #[must_use]
    pub fn public_read(bucket: &str) -> Self {
        Self {
            version: default_version(),
            statements: vec![Statement {
                sid: Some("PublicRead".to_owned()),
                effect: Effect::Allow,
                principal: PrincipalPattern::Any,
                action: vec![Action::GetObject.as_str().to_owned()],
                resource: vec![format!("{ARN_PREFIX}{bucket}/*")],
            }],
        }
    }

    /// Evaluate the policy for one request.
    #[must_use]
    pub fn evaluate(&self, principal: &Principal, action: Action, resource: &str) -> PolicyDecision {
        let mut allowed = false;
        for statement in self
            .statements
            .iter()
            .filter(|s| s.matches(principal, action, resource))
        {
            match statement.effect {
                Effect::Deny => return PolicyDecision::ExplicitDeny,
                Effect::Allow => allowed = true,
            }
        }
        if allowed {
            PolicyDecision::Allow
        } else {
            PolicyDecision::ImplicitDeny
        }
    }

    /// [`evaluate`](Self::evaluate) collapsed to allow/deny.
    #[must_use]
    pub fn authorize(&self, principal: &Principal, action: Action, resource: &str) -> AccessDecision {
        self.evaluate(principal, action, resource).into()
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(v) => vec![v],
        OneOrMany::Many(v) => v,
    })
}

// ---------------------------------------------------------------------------
// Wildcards
// ---------------------------------------------------------------------------

/// Match `input` against `pattern`, where `*` matches any run of characters
/// (including none) and `?` matches exactly one.
///
/// # Examples
///
/// ```
/// use s3lite_core::policy::glob_match;
///
/// assert!(glob_match("arn:aws:s3:::photos/*", "arn:aws:s3:::photos/2024/cat.jpg"));
/// assert!(glob_match("file-?.txt", "file-1.txt"));
/// assert!(!glob_match("file-?.txt", "file-10.txt"));
/// ```
#[must_use]
pub fn glob_match(pattern: &str, input: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let input: Vec<char> = input.chars().collect();

    let (mut p, mut i) = (0, 0);
    // Position of the last `*` and the input index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while i < input.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, i));
                p += 1;
            }
            Some(&c) if c == '?' || c == input[i] => {
                p += 1;
                i += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    i = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

fn glob_match_ignore_case(pattern: &str, input: &str) -> bool {
    glob_match(&pattern.to_ascii_lowercase(), &input.to_ascii_lowercase())
}
