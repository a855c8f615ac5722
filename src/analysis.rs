use crate::model::{BenchmarkRecord, ExamResult, SubjectRecord};
use serde::Serialize;

/// Fixed weighting table for the weighted exam average. Core academic
/// subjects weigh 4, electives and social studies 2. Order matters: the
/// substring fallback in `weight_of` scans in this order and the first
/// match wins.
const SUBJECT_WEIGHTS: &[(&str, f64)] = &[
    ("國語文", 4.0),
    ("英語文", 4.0),
    ("數學A", 4.0),
    ("歷史", 2.0),
    ("地理", 2.0),
    ("公民與社會", 2.0),
    ("選修化學", 2.0),
    ("選修化學-物質與能量", 2.0),
    ("選修物理", 2.0),
    ("選修物理-力學一", 2.0),
];

/// Weight for subjects the table does not know.
pub const DEFAULT_SUBJECT_WEIGHT: f64 = 2.0;

const SHORT_NAMES: &[(&str, &str)] = &[
    ("英語文", "英文"),
    ("公民與社會", "公民"),
    ("選修化學-物質與能量", "化學"),
    ("選修物理-力學一", "物理"),
    ("選修化學", "化學"),
    ("選修物理", "物理"),
];

/// Effective numeric score. The pre-formatted display string wins when it
/// parses to a finite number, to match what the student actually saw;
/// otherwise the raw numeric field, missing treated as 0.
pub fn numeric_score(display: Option<&str>, fallback: Option<f64>) -> f64 {
    if let Some(text) = display {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            if let Ok(parsed) = trimmed.parse::<f64>() {
                if parsed.is_finite() {
                    return parsed;
                }
            }
        }
    }
    fallback.unwrap_or(0.0)
}

/// Exact table match, then bidirectional substring match in table order
/// ("選修化學-物質與能量" matches the "選修化學" entry), then the default.
pub fn weight_of(subject_name: &str) -> f64 {
    for (key, weight) in SUBJECT_WEIGHTS {
        if *key == subject_name {
            return *weight;
        }
    }
    for (key, weight) in SUBJECT_WEIGHTS {
        if subject_name.contains(key) || key.contains(subject_name) {
            return *weight;
        }
    }
    DEFAULT_SUBJECT_WEIGHT
}

/// Display abbreviation for chart axes and narrow table cells.
pub fn shorten_name(name: &str) -> &str {
    for (long, short) in SHORT_NAMES {
        if *long == name {
            return short;
        }
    }
    name
}

/// Strips the `<br/>` line-break artifact the benchmark export embeds in
/// subject names. Idempotent.
pub fn clean_subject_name(name: &str) -> String {
    name.replace("<br/>", "")
}

/// Benchmark lookup for a subject: name equality after cleaning, else the
/// record at the same position. The positional fallback silently mismatches
/// when the two lists are not aligned; that leniency is inherited from the
/// data source.
pub fn benchmark_for<'a>(
    subject: &SubjectRecord,
    index: usize,
    benchmarks: &'a [BenchmarkRecord],
) -> Option<&'a BenchmarkRecord> {
    benchmarks
        .iter()
        .find(|b| clean_subject_name(&b.subject_name) == subject.subject_name)
        .or_else(|| benchmarks.get(index))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExamStatistics {
    /// None when the subject list is empty; renders as a placeholder,
    /// never as 0.
    pub weighted_average: Option<f64>,
    pub highest: Option<f64>,
    pub count: usize,
}

/// Aggregate exam metrics across the subject list. The unrounded average is
/// canonical; 1-decimal rounding happens only in display strings.
pub fn aggregate(subjects: &[SubjectRecord]) -> ExamStatistics {
    if subjects.is_empty() {
        return ExamStatistics {
            weighted_average: None,
            highest: None,
            count: 0,
        };
    }

    let mut weighted_sum = 0.0_f64;
    let mut total_weight = 0.0_f64;
    let mut highest = f64::NEG_INFINITY;
    for subject in subjects {
        let score = numeric_score(subject.score_display.as_deref(), subject.score);
        let weight = weight_of(&subject.subject_name);
        weighted_sum += score * weight;
        total_weight += weight;
        if score > highest {
            highest = score;
        }
    }

    let weighted_average = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };

    ExamStatistics {
        weighted_average: Some(weighted_average),
        highest: Some(highest),
        count: subjects.len(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    High,
    Medium,
    Low,
}

/// Score-magnitude tier; boundaries inclusive on the lower bound.
pub fn score_tier(score: f64) -> ScoreTier {
    if score >= 80.0 {
        ScoreTier::High
    } else if score >= 60.0 {
        ScoreTier::Medium
    } else {
        ScoreTier::Low
    }
}

/// Variant order is rank order: later variants are better tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkTier {
    Poor,
    Below,
    Average,
    Good,
    Excellent,
}

impl BenchmarkTier {
    pub fn label(&self) -> &'static str {
        match self {
            BenchmarkTier::Excellent => "頂標以上",
            BenchmarkTier::Good => "前標以上",
            BenchmarkTier::Average => "均標以上",
            BenchmarkTier::Below => "後標以上",
            BenchmarkTier::Poor => "底標以下",
        }
    }
}

/// Compares top-down against the five cut points; first satisfied
/// threshold wins.
pub fn benchmark_tier(score: f64, benchmark: &BenchmarkRecord) -> BenchmarkTier {
    if score >= benchmark.top {
        BenchmarkTier::Excellent
    } else if score >= benchmark.front {
        BenchmarkTier::Good
    } else if score >= benchmark.average {
        BenchmarkTier::Average
    } else if score >= benchmark.back {
        BenchmarkTier::Below
    } else {
        BenchmarkTier::Poor
    }
}

pub const RANGE_LABELS: [&str; 6] = ["90-100", "80-89", "70-79", "60-69", "50-59", "0-49"];

/// Ten-point score ranges with everything under 50 collapsed into one.
pub fn range_bucket(score: f64) -> &'static str {
    if score >= 90.0 {
        "90-100"
    } else if score >= 80.0 {
        "80-89"
    } else if score >= 70.0 {
        "70-79"
    } else if score >= 60.0 {
        "60-69"
    } else if score >= 50.0 {
        "50-59"
    } else {
        "0-49"
    }
}

/// 1-based rank to percentile: rank 1 of N rounds to 100. Undefined when
/// the cohort is empty.
pub fn percentile(rank: i64, count: i64) -> Option<i64> {
    if count <= 0 {
        return None;
    }
    let value = (1.0 - (rank - 1) as f64 / count as f64) * 100.0;
    Some(value.round() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PercentileBand {
    Poor,
    Below,
    Average,
    Good,
    Excellent,
}

pub fn percentile_band(percentile: i64) -> PercentileBand {
    if percentile >= 88 {
        PercentileBand::Excellent
    } else if percentile >= 75 {
        PercentileBand::Good
    } else if percentile >= 50 {
        PercentileBand::Average
    } else if percentile >= 25 {
        PercentileBand::Below
    } else {
        PercentileBand::Poor
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBucket {
    pub label: &'static str,
    pub count: i64,
    /// Numeric share of the cohort in percent; 0 when the cohort is empty.
    pub share: f64,
    /// Bar width for rendering: the share floored at 5 when the bucket is
    /// non-empty so tiny bands stay visible.
    pub width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub buckets: Vec<DistributionBucket>,
    pub total: i64,
}

/// Reduces the ten per-decile counts into the six rendered buckets. The top
/// band is `大於90Count` alone; everything below 50 is summed into "0-49".
pub fn distribution(benchmark: &BenchmarkRecord) -> Distribution {
    let low_sum = benchmark.ge40_count
        + benchmark.ge30_count
        + benchmark.ge20_count
        + benchmark.ge10_count
        + benchmark.ge0_count;
    let counts = [
        benchmark.ge90_count,
        benchmark.ge80_count,
        benchmark.ge70_count,
        benchmark.ge60_count,
        benchmark.ge50_count,
        low_sum,
    ];
    let total: i64 = counts.iter().sum();

    let buckets = RANGE_LABELS
        .into_iter()
        .zip(counts)
        .map(|(label, count)| {
            let share = if total > 0 && count > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let width = if count > 0 { share.max(5.0) } else { 0.0 };
            DistributionBucket {
                label,
                count,
                share,
                width,
            }
        })
        .collect();

    Distribution { buckets, total }
}

const PLACEHOLDER: &str = "--";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBlock {
    pub name: String,
    pub class_name: String,
    pub seat_no: String,
    pub student_no: String,
    pub avatar_text: String,
    pub data_time: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub rank: i64,
    pub count: Option<i64>,
    pub display: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankBlock {
    pub class_rank: Option<RankEntry>,
    pub category_rank: Option<RankEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsBlock {
    pub weighted_average: Option<f64>,
    pub average_display: String,
    pub subject_count: usize,
    pub highest: Option<f64>,
    pub highest_display: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankDetail {
    pub rank: i64,
    pub count: Option<i64>,
    pub percentile: Option<i64>,
    pub band: Option<PercentileBand>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
    pub subject_name: String,
    pub short_name: String,
    pub score: f64,
    pub score_display: String,
    pub tier: ScoreTier,
    pub class_avg: f64,
    pub class_avg_display: String,
    pub diff: f64,
    pub diff_display: String,
    pub diff_positive: bool,
    pub class_rank: Option<RankDetail>,
    pub year_rank: Option<RankDetail>,
    pub progress_width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRow {
    pub subject_name: String,
    pub short_name: String,
    pub top: f64,
    pub front: f64,
    pub average: f64,
    pub back: f64,
    pub bottom: f64,
    pub std_dev: f64,
    pub score: f64,
    pub tier: BenchmarkTier,
    pub tier_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionCard {
    pub subject_name: String,
    pub my_bucket: &'static str,
    pub total: i64,
    pub buckets: Vec<DistributionBucket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub student: StudentBlock,
    pub exam_title: Option<String>,
    pub rank: RankBlock,
    pub statistics: StatisticsBlock,
    pub score_cards: Vec<ScoreCard>,
    pub benchmark_rows: Vec<BenchmarkRow>,
    pub distribution_cards: Vec<DistributionCard>,
}

fn fmt_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

fn rank_entry(rank: Option<f64>, count: Option<i64>, show_count: bool) -> Option<RankEntry> {
    let rank = rank?.floor() as i64;
    let count = count.filter(|c| *c > 0);
    let display = match count {
        Some(c) if show_count => format!("{}/{}", rank, c),
        _ => rank.to_string(),
    };
    Some(RankEntry {
        rank,
        count,
        display,
    })
}

fn build_score_card(subject: &SubjectRecord) -> ScoreCard {
    let score = numeric_score(subject.score_display.as_deref(), subject.score);
    let class_avg = numeric_score(
        subject.class_avg_score_display.as_deref(),
        subject.class_avg_score,
    );
    let diff = score - class_avg;

    let class_rank = subject.class_rank.map(|r| {
        let rank = r.floor() as i64;
        let count = subject.class_rank_count.filter(|c| *c > 0);
        let pr = count.and_then(|c| percentile(rank, c));
        RankDetail {
            rank,
            count,
            percentile: pr,
            band: pr.map(percentile_band),
        }
    });
    let year_rank = subject.year_rank.map(|r| RankDetail {
        rank: r.floor() as i64,
        count: subject.year_rank_count.filter(|c| *c > 0),
        percentile: None,
        band: None,
    });

    ScoreCard {
        subject_name: subject.subject_name.clone(),
        short_name: shorten_name(&subject.subject_name).to_string(),
        score,
        score_display: subject
            .score_display
            .clone()
            .unwrap_or_else(|| fmt_number(score)),
        tier: score_tier(score),
        class_avg,
        class_avg_display: subject
            .class_avg_score_display
            .clone()
            .unwrap_or_else(|| format!("{:.2}", class_avg)),
        diff,
        diff_display: format!("{:.2}", diff.abs()),
        diff_positive: diff >= 0.0,
        class_rank,
        year_rank,
        progress_width: score,
    }
}

/// One-pass derivation of everything the dashboard renders. Pure; the
/// caller has already validated the payload shape.
pub fn build_report(result: &ExamResult) -> ReportModel {
    let student_name = or_placeholder(result.student_name.as_deref());
    let avatar_text = student_name
        .chars()
        .next()
        .map(|c| c.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    let student = StudentBlock {
        name: student_name,
        class_name: or_placeholder(result.student_class_name.as_deref()),
        seat_no: or_placeholder(result.student_seat_no.as_deref()),
        student_no: or_placeholder(result.student_no.as_deref()),
        avatar_text,
        data_time: or_placeholder(result.data_time_display.as_deref()),
    };

    let term_display = result
        .subjects
        .first()
        .and_then(|s| s.year_term_display.as_deref());
    let exam_name = result.exam_item.as_ref().and_then(|e| e.exam_name.as_deref());
    let exam_title = match (term_display, exam_name) {
        (Some(term), Some(name)) => Some(format!("{} {}", term, name)),
        (None, Some(name)) => Some(name.to_string()),
        _ => None,
    };

    let rank = match result.exam_item.as_ref() {
        Some(item) => RankBlock {
            class_rank: if result.show_class_rank {
                rank_entry(
                    item.class_rank,
                    item.class_count,
                    result.show_class_rank_count,
                )
            } else {
                None
            },
            category_rank: if result.show_category_rank {
                rank_entry(
                    item.category_rank,
                    item.category_count,
                    result.show_category_rank_count,
                )
            } else {
                None
            },
        },
        None => RankBlock {
            class_rank: None,
            category_rank: None,
        },
    };

    let stats = aggregate(&result.subjects);
    let statistics = StatisticsBlock {
        weighted_average: stats.weighted_average,
        average_display: stats
            .weighted_average
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        subject_count: stats.count,
        highest: stats.highest,
        highest_display: stats
            .highest
            .map(fmt_number)
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    };

    let score_cards = result.subjects.iter().map(build_score_card).collect();

    let mut benchmark_rows = Vec::new();
    let mut distribution_cards = Vec::new();
    for (index, subject) in result.subjects.iter().enumerate() {
        let Some(benchmark) = benchmark_for(subject, index, &result.benchmarks) else {
            continue;
        };
        let score = numeric_score(subject.score_display.as_deref(), subject.score);
        let tier = benchmark_tier(score, benchmark);
        benchmark_rows.push(BenchmarkRow {
            subject_name: subject.subject_name.clone(),
            short_name: shorten_name(&subject.subject_name).to_string(),
            top: benchmark.top,
            front: benchmark.front,
            average: benchmark.average,
            back: benchmark.back,
            bottom: benchmark.bottom,
            std_dev: benchmark.std_dev,
            score,
            tier,
            tier_label: tier.label(),
        });

        let dist = distribution(benchmark);
        distribution_cards.push(DistributionCard {
            subject_name: subject.subject_name.clone(),
            my_bucket: range_bucket(score),
            total: dist.total,
            buckets: dist.buckets,
        });
    }

    ReportModel {
        student,
        exam_title,
        rank,
        statistics,
        score_cards,
        benchmark_rows,
        distribution_cards,
    }
}
