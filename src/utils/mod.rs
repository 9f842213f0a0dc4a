pub mod student_directory;
