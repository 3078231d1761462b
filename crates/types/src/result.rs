//! Numeric result codes.
//!
//! Zero means success. Every other value names one error kind. These
//! are what callback consumers receive; richer errors stay inside the
//! crates that produce them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResultCode {
    Success = 0x0,
    General = 0x1,
    FileWriteFailed = 0x10,
    DirectoryCreateFailed = 0x11,
    SettingsFileReadFailed = 0x12,
    SettingsFileWriteFailed = 0x13,
    RegionCodeConversionFailed = 0x100,
    CloudFormationStackCreationFailed = 0x200,
    CloudFormationStackUpdateFailed = 0x201,
    CloudFormationStackDeleteFailed = 0x202,
    CloudFormationDescribeResourceFailed = 0x203,
    TemplateGenerationFailed = 0x210,
    DashboardUploadFailed = 0x211,
    LayerUploadFailed = 0x212,
    FunctionUploadFailed = 0x213,
    OrchestrationDeploymentInProgress = 0x300,
    OrchestrationInvalidFeatureState = 0x301,
    MalformedBundleName = 0x400,
    MalformedBundleItemKey = 0x401,
    UserGameplayDataApiCallFailed = 0x402,
    UserGameplayDataApiCallDropped = 0x403,
    UserGameplayDataCacheReadFailed = 0x404,
    UserGameplayDataCacheWriteFailed = 0x405,
    /// Not a failure: the call was queued for automatic retry.
    UserGameplayDataApiCallEnqueued = 0x10400,
}

impl ResultCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }

    /// Warnings report deferred success and must not be treated as errors.
    pub fn is_warning(self) -> bool {
        self == ResultCode::UserGameplayDataApiCallEnqueued
    }

    /// Symbolic name, as it appears in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "GAMEKIT_SUCCESS",
            Self::General => "GAMEKIT_ERROR_GENERAL",
            Self::FileWriteFailed => "GAMEKIT_ERROR_FILE_WRITE_FAILED",
            Self::DirectoryCreateFailed => "GAMEKIT_ERROR_DIRECTORY_CREATE_FAILED",
            Self::SettingsFileReadFailed => "GAMEKIT_ERROR_SETTINGS_FILE_READ_FAILED",
            Self::SettingsFileWriteFailed => "GAMEKIT_ERROR_SETTINGS_FILE_WRITE_FAILED",
            Self::RegionCodeConversionFailed => "GAMEKIT_ERROR_REGION_CODE_CONVERSION_FAILED",
            Self::CloudFormationStackCreationFailed => {
                "GAMEKIT_ERROR_CLOUDFORMATION_STACK_CREATION_FAILED"
            }
            Self::CloudFormationStackUpdateFailed => "GAMEKIT_ERROR_CLOUDFORMATION_STACK_UPDATE_FAILED",
            Self::CloudFormationStackDeleteFailed => "GAMEKIT_ERROR_CLOUDFORMATION_STACK_DELETE_FAILED",
            Self::CloudFormationDescribeResourceFailed => {
                "GAMEKIT_ERROR_CLOUDFORMATION_DESCRIBE_RESOURCE_FAILED"
            }
            Self::TemplateGenerationFailed => "GAMEKIT_ERROR_TEMPLATE_GENERATION_FAILED",
            Self::DashboardUploadFailed => "GAMEKIT_ERROR_DASHBOARD_UPLOAD_FAILED",
            Self::LayerUploadFailed => "GAMEKIT_ERROR_LAYER_UPLOAD_FAILED",
            Self::FunctionUploadFailed => "GAMEKIT_ERROR_FUNCTION_UPLOAD_FAILED",
            Self::OrchestrationDeploymentInProgress => {
                "GAMEKIT_ERROR_ORCHESTRATION_DEPLOYMENT_IN_PROGRESS"
            }
            Self::OrchestrationInvalidFeatureState => {
                "GAMEKIT_ERROR_ORCHESTRATION_INVALID_FEATURE_STATE"
            }
            Self::MalformedBundleName => "GAMEKIT_ERROR_MALFORMED_BUNDLE_NAME",
            Self::MalformedBundleItemKey => "GAMEKIT_ERROR_MALFORMED_BUNDLE_ITEM_KEY",
            Self::UserGameplayDataApiCallFailed => "GAMEKIT_ERROR_USER_GAMEPLAY_DATA_API_CALL_FAILED",
            Self::UserGameplayDataApiCallDropped => {
                "GAMEKIT_ERROR_USER_GAMEPLAY_DATA_API_CALL_DROPPED"
            }
            Self::UserGameplayDataCacheReadFailed => {
                "GAMEKIT_ERROR_USER_GAMEPLAY_DATA_CACHE_READ_FAILED"
            }
            Self::UserGameplayDataCacheWriteFailed => {
                "GAMEKIT_ERROR_USER_GAMEPLAY_DATA_CACHE_WRITE_FAILED"
            }
            Self::UserGameplayDataApiCallEnqueued => {
                "GAMEKIT_WARNING_USER_GAMEPLAY_DATA_API_CALL_ENQUEUED"
            }
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:x})", self.name(), self.as_u32())
    }
}

impl From<ResultCode> for u32 {
    fn from(code: ResultCode) -> Self {
        code.as_u32()
    }
}
