pub use super::course::Entity as Course;
pub use super::enrolled_course::Entity as EnrolledCourse;
pub use super::enrollment::Entity as Enrollment;
pub use super::lesson::Entity as Lesson;
pub use super::lesson_completion::Entity as LessonCompletion;
pub use super::playlist::Entity as Playlist;
pub use super::review::Entity as Review;
pub use super::user::Entity as User;
pub use super::video::Entity as Video;
