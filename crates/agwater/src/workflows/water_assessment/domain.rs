use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::thresholds::{GM_THRESHOLD, STV_THRESHOLD};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for a water risk assessment.
    AssessmentId
);
string_id!(SourceAssessmentId);
string_id!(FieldAssessmentId);
string_id!(EnvironmentalAssessmentId);
string_id!(
    /// Farm owned by farm management; never created here.
    FarmId
);
string_id!(
    /// Water source owned by farm management; referenced by id only.
    WaterSourceId
);
string_id!(
    /// Growing field owned by farm management; referenced by id only.
    FieldId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    InProgress,
    Submitted,
    Approved,
}

impl AssessmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
        }
    }

    pub const fn is_editable(self) -> bool {
        !matches!(self, Self::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicalCondition {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl PhysicalCondition {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestingFrequency {
    Monthly,
    Quarterly,
    Annual,
    #[serde(rename = "none")]
    NotTested,
}

impl TestingFrequency {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
            Self::NotTested => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationMethod {
    Drip,
    Subsurface,
    MicroSprinkler,
    HandWatering,
    Overhead,
    Furrow,
    #[serde(rename = "none")]
    NoIrrigation,
}

impl ApplicationMethod {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Drip => "drip",
            Self::Subsurface => "subsurface",
            Self::MicroSprinkler => "micro-sprinkler",
            Self::HandWatering => "hand watering",
            Self::Overhead => "overhead",
            Self::Furrow => "furrow",
            Self::NoIrrigation => "no irrigation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropContactType {
    SoilOnly,
    Indirect,
    Direct,
}

impl CropContactType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SoilOnly => "soil only",
            Self::Indirect => "indirect",
            Self::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WildlifePressure {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjacentLandUse {
    Cropland,
    Forest,
    Residential,
    Grazing,
    AnimalOperation,
    Industrial,
    SewageTreatment,
    Other,
}

impl AdjacentLandUse {
    /// Animal, industrial, and sewage neighbors carry fecal or chemical loads.
    pub const fn is_elevated(self) -> bool {
        matches!(
            self,
            Self::Grazing | Self::AnimalOperation | Self::Industrial | Self::SewageTreatment
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cropland => "cropland",
            Self::Forest => "forest",
            Self::Residential => "residential",
            Self::Grazing => "grazing",
            Self::AnimalOperation => "animal operation",
            Self::Industrial => "industrial",
            Self::SewageTreatment => "sewage treatment",
            Self::Other => "other",
        }
    }
}

/// Categorical band derived from a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub const fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl From<RiskLevel> for ActionPriority {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Self::Low,
            RiskLevel::Medium => Self::Medium,
            RiskLevel::High => Self::High,
            RiskLevel::Critical => Self::Critical,
        }
    }
}

/// Regulatory outcome assigned to an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdaDetermination {
    NoTreatment,
    TreatmentRequired,
    DieOffRequired,
    TestingRequired,
}

impl FdaDetermination {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoTreatment => "no_treatment",
            Self::TreatmentRequired => "treatment_required",
            Self::DieOffRequired => "die_off_required",
            Self::TestingRequired => "testing_required",
        }
    }

    pub fn summary(&self, required_die_off_days: Option<u32>) -> String {
        match self {
            Self::NoTreatment => "no treatment or waiting period required".to_string(),
            Self::TreatmentRequired => "water treatment required before use".to_string(),
            Self::DieOffRequired => match required_die_off_days {
                Some(days) => format!("die-off interval of {days} day(s) required before harvest"),
                None => "die-off interval required before harvest".to_string(),
            },
            Self::TestingRequired => "additional water quality testing required".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Source,
    Application,
    Environmental,
    Timing,
}

impl RiskCategory {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Source,
            Self::Application,
            Self::Environmental,
            Self::Timing,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Source => "Water Source",
            Self::Application => "Application Method",
            Self::Environmental => "Environmental",
            Self::Timing => "Harvest Timing",
        }
    }
}

/// Individual observation that moved a category score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    PhysicalCondition,
    TestingFrequency,
    GmExceedance,
    StvExceedance,
    ContaminationRisk,
    IrrigationMethod,
    CropContact,
    HarvestInterval,
    CafoProximity,
    AnimalOperationDistance,
    Flooding,
    SepticProximity,
    WildlifePressure,
    AdjacentLandUse,
    AdditionalRisk,
}

impl RiskFactor {
    /// Corrective step recommended when this factor dominates a category.
    pub const fn remediation(self) -> &'static str {
        match self {
            Self::PhysicalCondition => {
                "Repair or rehabilitate the water source (well cap, casing, intake, or conveyance)"
            }
            Self::TestingFrequency => "Increase water testing frequency to at least quarterly",
            Self::GmExceedance => "Investigate and correct the source of elevated E. coli (GM)",
            Self::StvExceedance => "Investigate intermittent E. coli spikes exceeding the STV",
            Self::ContaminationRisk => "Eliminate or isolate identified contamination pathways",
            Self::IrrigationMethod => {
                "Switch to drip or subsurface irrigation to avoid wetting harvestable produce"
            }
            Self::CropContact => {
                "Reduce water contact with the harvestable portion of the crop"
            }
            Self::HarvestInterval => {
                "Lengthen the interval between last irrigation and harvest"
            }
            Self::CafoProximity => {
                "Install buffers or diversion structures against the nearby CAFO"
            }
            Self::AnimalOperationDistance => {
                "Increase separation or add runoff barriers from the nearest animal operation"
            }
            Self::Flooding => "Assess flooded areas and withhold affected produce from harvest",
            Self::SepticProximity => "Inspect nearby septic systems for leaks or failure",
            Self::WildlifePressure => "Deploy wildlife deterrents and monitor for intrusion",
            Self::AdjacentLandUse => "Establish buffer strips against high-risk adjacent land",
            Self::AdditionalRisk => "Review and mitigate the additional identified risks",
        }
    }
}

/// Discrete contribution to a category score, kept for transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub category: RiskCategory,
    pub subject: String,
    pub factor: RiskFactor,
    pub points: f64,
    pub notes: String,
}

/// Inconsistent observation that is scored anyway but must be reviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityWarning {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MitigationAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RiskCategory>,
    pub action_description: String,
    pub priority: ActionPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Calculated result attached to an assessment on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScoreResult {
    pub source_risk_score: Option<f64>,
    pub application_risk_score: Option<f64>,
    pub environmental_risk_score: Option<f64>,
    pub timing_risk_score: Option<f64>,
    pub overall_risk_score: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub fda_determination: FdaDetermination,
    pub required_die_off_days: Option<u32>,
    pub mitigation_actions: Vec<MitigationAction>,
    pub components: Vec<ScoreComponent>,
    pub warnings: Vec<DataQualityWarning>,
    pub calculated_at: DateTime<Utc>,
}

impl RiskScoreResult {
    pub fn is_complete(&self) -> bool {
        self.overall_risk_score.is_some()
    }

    pub fn summary(&self) -> String {
        match (self.overall_risk_score, self.risk_level) {
            (Some(score), Some(level)) => format!(
                "overall risk {:.1} ({}): {}",
                score,
                level.label(),
                self.fda_determination.summary(self.required_die_off_days)
            ),
            _ => format!(
                "overall risk incomplete: {}",
                self.fda_determination.summary(self.required_die_off_days)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signer_name: String,
    pub signature_blob: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub farm_id: FarmId,
    pub season_year: i32,
    pub assessment_date: NaiveDate,
    pub notes: Option<String>,
    pub status: AssessmentStatus,
    pub risk_score: Option<RiskScoreResult>,
    pub mitigation_actions: Vec<MitigationAction>,
    pub signature: Option<Signature>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAssessment {
    pub id: SourceAssessmentId,
    pub assessment_id: AssessmentId,
    pub water_source_id: WaterSourceId,
    pub physical_condition: PhysicalCondition,
    pub testing_frequency: TestingFrequency,
    pub ecoli_gm: Option<f64>,
    pub ecoli_stv: Option<f64>,
    pub sample_count: Option<u32>,
    pub contamination_risks: BTreeSet<String>,
    pub meets_gm_threshold: bool,
    pub meets_stv_threshold: bool,
}

impl SourceAssessment {
    pub fn new(
        id: SourceAssessmentId,
        assessment_id: AssessmentId,
        water_source_id: WaterSourceId,
        input: SourceConditionInput,
    ) -> Self {
        let mut record = Self {
            id,
            assessment_id,
            water_source_id,
            physical_condition: input.physical_condition,
            testing_frequency: input.testing_frequency,
            ecoli_gm: None,
            ecoli_stv: None,
            sample_count: None,
            contamination_risks: BTreeSet::new(),
            meets_gm_threshold: true,
            meets_stv_threshold: true,
        };
        record.apply(input);
        record
    }

    /// Overwrite the observed values and refresh the derived threshold flags.
    pub fn apply(&mut self, input: SourceConditionInput) {
        self.physical_condition = input.physical_condition;
        self.testing_frequency = input.testing_frequency;
        self.ecoli_gm = input.ecoli_gm;
        self.ecoli_stv = input.ecoli_stv;
        self.sample_count = input.sample_count;
        self.contamination_risks = input.contamination_risks;
        self.meets_gm_threshold = self.ecoli_gm.map_or(true, |gm| gm <= GM_THRESHOLD);
        self.meets_stv_threshold = self.ecoli_stv.map_or(true, |stv| stv <= STV_THRESHOLD);
    }

    pub fn breaches_threshold(&self) -> bool {
        !self.meets_gm_threshold || !self.meets_stv_threshold
    }

    pub fn lab_data_missing(&self) -> bool {
        self.ecoli_gm.is_none() && self.ecoli_stv.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAssessment {
    pub id: FieldAssessmentId,
    pub assessment_id: AssessmentId,
    pub field_id: FieldId,
    pub water_source_id: Option<WaterSourceId>,
    pub application_method: ApplicationMethod,
    pub crop_contact_type: CropContactType,
    pub typical_days_before_harvest: Option<u32>,
    pub die_off_period_adequate: Option<bool>,
}

impl FieldAssessment {
    /// Whether this field may receive water from `source`.
    pub fn draws_from(&self, source: &WaterSourceId) -> bool {
        self.water_source_id
            .as_ref()
            .map_or(true, |drawn| drawn == source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalAssessment {
    pub id: EnvironmentalAssessmentId,
    pub assessment_id: AssessmentId,
    pub cafo_within_1000ft: bool,
    pub nearest_animal_operation_ft: Option<f64>,
    pub flooding_history: bool,
    pub flooding_last_12_months: bool,
    pub septic_nearby: bool,
    pub wildlife_pressure: WildlifePressure,
    pub adjacent_land_uses: BTreeSet<AdjacentLandUse>,
    pub additional_risks: Vec<String>,
}

impl EnvironmentalAssessment {
    pub fn new(
        id: EnvironmentalAssessmentId,
        assessment_id: AssessmentId,
        input: EnvironmentalInput,
    ) -> Self {
        Self {
            id,
            assessment_id,
            cafo_within_1000ft: input.cafo_within_1000ft,
            nearest_animal_operation_ft: input.nearest_animal_operation_ft,
            flooding_history: input.flooding_history || input.flooding_last_12_months,
            flooding_last_12_months: input.flooding_last_12_months,
            septic_nearby: input.septic_nearby,
            wildlife_pressure: input.wildlife_pressure,
            adjacent_land_uses: input.adjacent_land_uses,
            additional_risks: input.additional_risks,
        }
    }
}

/// Operator input for creating an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssessment {
    pub farm_id: FarmId,
    pub season_year: i32,
    pub assessment_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of the assessment header; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentUpdate {
    #[serde(default)]
    pub farm_id: Option<FarmId>,
    #[serde(default)]
    pub season_year: Option<i32>,
    #[serde(default)]
    pub assessment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConditionInput {
    #[serde(default)]
    pub id: Option<SourceAssessmentId>,
    pub physical_condition: PhysicalCondition,
    pub testing_frequency: TestingFrequency,
    #[serde(default)]
    pub ecoli_gm: Option<f64>,
    #[serde(default)]
    pub ecoli_stv: Option<f64>,
    #[serde(default)]
    pub sample_count: Option<u32>,
    #[serde(default)]
    pub contamination_risks: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPracticeInput {
    #[serde(default)]
    pub id: Option<FieldAssessmentId>,
    #[serde(default)]
    pub water_source_id: Option<WaterSourceId>,
    pub application_method: ApplicationMethod,
    pub crop_contact_type: CropContactType,
    #[serde(default)]
    pub typical_days_before_harvest: Option<i64>,
    #[serde(default)]
    pub die_off_period_adequate: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalInput {
    #[serde(default)]
    pub id: Option<EnvironmentalAssessmentId>,
    #[serde(default)]
    pub cafo_within_1000ft: bool,
    #[serde(default)]
    pub nearest_animal_operation_ft: Option<f64>,
    #[serde(default)]
    pub flooding_history: bool,
    #[serde(default)]
    pub flooding_last_12_months: bool,
    #[serde(default)]
    pub septic_nearby: bool,
    #[serde(default)]
    pub wildlife_pressure: WildlifePressure,
    #[serde(default)]
    pub adjacent_land_uses: BTreeSet<AdjacentLandUse>,
    #[serde(default)]
    pub additional_risks: Vec<String>,
}
