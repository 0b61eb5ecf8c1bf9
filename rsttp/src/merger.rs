use crate::cleaner::{clean_text, count_alnum_tokens, dedup_tokens};
use crate::models::{CourseEntry, MergedCourseEntry};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Label of the mid-semester break week.
pub const RECESS_WEEK: &str = "Recess";

/// Sort key of a week label. Recess week sorts between weeks 7 and 8; unreadable labels go last.
pub fn week_sort_key(week: &str) -> f64 {
    if week == RECESS_WEEK {
        return 7.5;
    }
    week.trim().parse::<f64>().unwrap_or(f64::MAX)
}

fn compare_weeks(a: &String, b: &String) -> Ordering {
    week_sort_key(a).partial_cmp(&week_sort_key(b)).unwrap_or(Ordering::Equal)
}

/// Picks the most complete course code reading: most alphanumeric runs, then longest.
/// The earliest reading wins ties.
fn best_course_code(group: &[&CourseEntry]) -> String {
    let mut best: Option<(&str, (usize, usize))> = None;
    for entry in group {
        let code = entry.course_code.as_str();
        let score = (count_alnum_tokens(code), code.len());
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((code, score)),
        }
    }
    best.map(|(code, _)| code.to_string()).unwrap_or_default()
}

/// Most frequent value; the first value seen wins ties.
fn plurality<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value.to_string()).unwrap_or_default()
}

fn merge_group(group: &[&CourseEntry]) -> MergedCourseEntry {
    let seed = group[0];

    let mut weeks: Vec<String> = Vec::new();
    for week in group.iter().flat_map(|e| e.weeks.iter()) {
        if !weeks.contains(week) {
            weeks.push(week.clone());
        }
    }
    weeks.sort_by(compare_weeks);

    let notes: BTreeSet<&str> =
        group.iter().map(|e| e.note.as_str()).filter(|n| !n.is_empty()).collect();

    MergedCourseEntry {
        course_code: dedup_tokens(&clean_text(&best_course_code(group))),
        group: dedup_tokens(&clean_text(&plurality(group.iter().map(|e| e.group.as_str())))),
        location: dedup_tokens(&clean_text(&plurality(group.iter().map(|e| e.location.as_str())))),
        weeks: weeks,
        time: seed.time,
        day: seed.day,
        start_date: seed.start_date,
        note: notes.into_iter().collect::<Vec<&str>>().join("; "),
    }
}

/// Merges the per-column entries of a day into entries spanning several weeks.
///
/// Grouping is a single greedy pass: the first unmerged entry seeds a group and
/// every later unmerged entry on the same day whose time overlaps the seed's joins it.
///
/// # Arguments
///
/// * `entries` - Raw entries in extraction order.
///
/// # Returns
///
/// One merged entry per group, in seed order.
pub fn merge_entries(entries: &[CourseEntry]) -> Vec<MergedCourseEntry> {
    let mut used = vec![false; entries.len()];
    let mut merged = Vec::new();

    for (i, seed) in entries.iter().enumerate() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut group = vec![seed];
        for (j, other) in entries.iter().enumerate().skip(i + 1) {
            if used[j] {
                continue;
            }
            if seed.day == other.day && seed.time.overlaps(&other.time) {
                group.push(other);
                used[j] = true;
            }
        }
        if group.len() > 1 {
            tracing::debug!("Merged {} entries of {} at {}", group.len(), seed.day, seed.time);
        }
        merged.push(merge_group(&group));
    }
    return merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Day, StartDate};
    use crate::test_utils::course_entry;

    #[test]
    fn test_week_sort_key_orders_recess() {
        let mut weeks = vec!["8".to_string(), "Recess".to_string(), "7".to_string(), "10".to_string()];
        weeks.sort_by(compare_weeks);
        assert_eq!(weeks, vec!["7", "Recess", "8", "10"]);
    }

    #[test]
    fn test_touching_times_stay_separate() {
        let entries = vec![
            course_entry("SC2001", Day::Monday, "0830-0900", "3"),
            course_entry("SC2001", Day::Monday, "0900-0930", "3"),
        ];
        let merged = merge_entries(&entries);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_overlapping_columns_merge() {
        let entries = vec![
            course_entry("SC2001", Day::Monday, "0830-1000", "4"),
            course_entry("SC2001", Day::Monday, "0830-1000", "3"),
            course_entry("SC2001", Day::Tuesday, "0830-1000", "5"),
        ];
        let merged = merge_entries(&entries);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].weeks, vec!["3", "4"]);
        assert_eq!(merged[0].day, Day::Monday);
        assert_eq!(merged[1].weeks, vec!["5"]);
    }

    #[test]
    fn test_field_reconciliation() {
        let mut a = course_entry("SC2001", Day::Friday, "1030-1230", "1");
        a.group = "TEL2".to_string();
        a.location = "LT1".to_string();
        a.note = "NATIONAL DAY on Week 1".to_string();
        let mut b = course_entry("SC2001 ALGO ALGO", Day::Friday, "1100-1230", "2");
        b.group = "TEL1".to_string();
        b.location = "LT19".to_string();
        b.start_date = StartDate::Unknown;
        let mut c = course_entry("SC200", Day::Friday, "1030-1130", "Recess");
        c.group = "TEL1".to_string();
        c.location = "LT19".to_string();
        c.note = "DEEPAVALI on Week 7".to_string();

        let merged = merge_entries(&[a.clone(), b, c]);
        assert_eq!(merged.len(), 1);
        let m = &merged[0];
        assert_eq!(m.course_code, "SC2001 ALGO");
        assert_eq!(m.group, "TEL1");
        assert_eq!(m.location, "LT19");
        assert_eq!(m.weeks, vec!["1", "2", "Recess"]);
        assert_eq!(m.time, a.time);
        assert_eq!(m.start_date, a.start_date);
        assert_eq!(m.note, "DEEPAVALI on Week 7; NATIONAL DAY on Week 1");
    }

    #[test]
    fn test_vote_ties_keep_first_seen() {
        let mut a = course_entry("SC2001", Day::Monday, "0830-0930", "1");
        a.group = "TEL2".to_string();
        let mut b = course_entry("SC2001", Day::Monday, "0830-0930", "2");
        b.group = "TEL1".to_string();
        let merged = merge_entries(&[a, b]);
        assert_eq!(merged[0].group, "TEL2");
    }

    #[test]
    fn test_merge_is_idempotent_on_single_entries() {
        let mut entry = course_entry("SC2001", Day::Thursday, "1330-1530", "9");
        entry.note = "DEEPAVALI on Week 9".to_string();
        let once = merge_entries(&[entry]);
        let twice = merge_entries(&[CourseEntry::from(once[0].clone())]);
        assert_eq!(once, twice);
    }
}
