/// Payload handed to the external `POST /save_timetable/` endpoint
use serde::{Deserialize, Serialize};

use super::Timetable;
use crate::course::Course;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePayload {
    pub title: String,
    pub total_credits: u32,
    pub major_credits: u32,
    pub courses: Vec<SavedCourse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCourse {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub section: String,
    pub credits: u32,
    #[serde(rename = "targetYear")]
    pub target_year: String,
    pub instructor: String,
    pub category: String,
    pub semester: String,
    pub schedules: Vec<SavedSchedule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSchedule {
    pub day: String,
    pub location: String,
    /// Comma separated, e.g. `"1,2,3"`
    pub periods: String,
}

impl From<&Course> for SavedCourse {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            name: course.name.clone(),
            code: course.code.clone(),
            section: course.section.clone(),
            credits: course.credits,
            target_year: course.target_year.clone(),
            instructor: course.instructor.clone(),
            category: course.category.clone(),
            semester: course.semester.clone(),
            schedules: course
                .schedules
                .iter()
                .map(|s| SavedSchedule {
                    day: s.day.to_string(),
                    location: s.location.clone(),
                    periods: s.periods_string(),
                })
                .collect(),
        }
    }
}

impl SavePayload {
    pub fn from_timetable(timetable: &Timetable, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            total_credits: timetable.total_credits(),
            major_credits: timetable.major_credits(),
            courses: timetable.courses().iter().map(SavedCourse::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{CourseRecord, ScheduleEntry, Weekday};
    use serde_json::json;

    fn sample() -> Timetable {
        let mut t = Timetable::new();
        t.add_course(
            Course::new(10, "컴퓨터구조")
                .with_code("CSE2030")
                .with_credits(3)
                .with_category("전공필수")
                .with_schedule(ScheduleEntry::new(Weekday::Mon, [1, 2, 3], "E-301")),
        );
        t.add_course(
            Course::new(11, "영어회화")
                .with_code("ENG1001")
                .with_credits(2)
                .with_category("교양")
                .with_schedule(ScheduleEntry::new(Weekday::Thu, [4, 5], "L-110")),
        );
        t
    }

    #[test]
    fn test_payload_shape() {
        let payload = SavePayload::from_timetable(&sample(), "2학기 초안");
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["title"], "2학기 초안");
        assert_eq!(value["total_credits"], 5);
        assert_eq!(value["major_credits"], 3);
        assert_eq!(value["courses"][0]["code"], "CSE2030");
        assert_eq!(value["courses"][0]["targetYear"], "");
        assert_eq!(
            value["courses"][0]["schedules"][0],
            json!({ "day": "Mon", "location": "E-301", "periods": "1,2,3" })
        );
    }

    #[test]
    fn test_saved_course_reads_back_as_record() {
        let payload = SavePayload::from_timetable(&sample(), "draft");
        let value = serde_json::to_value(&payload.courses[1]).unwrap();
        let course = serde_json::from_value::<CourseRecord>(value).unwrap().into_course();

        assert_eq!(course, sample().courses()[1]);
    }

    #[test]
    fn test_empty_timetable_payload() {
        let payload = SavePayload::from_timetable(&Timetable::new(), "empty");

        assert_eq!(payload.total_credits, 0);
        assert!(payload.courses.is_empty());
    }
}
