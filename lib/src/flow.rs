use serde_json::Map;

use crate::{
    callstack::{CallStack, Thread},
    choice::Choice,
    json_read, json_write,
    object::{ContentGraph, RTObject},
    pointer::Pointer,
    story_error::StoryError,
};

/// An independent line of execution: its own call stack, output and choices.
#[derive(Debug, Clone)]
pub(crate) struct Flow {
    pub name: String,
    pub callstack: CallStack,
    pub output_stream: Vec<RTObject>,
    pub current_choices: Vec<Choice>,
}

impl Flow {
    pub fn new(name: &str, graph: &ContentGraph) -> Flow {
        Flow {
            name: name.to_string(),
            callstack: CallStack::new(Pointer::start_of(graph.root())),
            output_stream: Vec::new(),
            current_choices: Vec::new(),
        }
    }

    pub fn from_json(
        name: &str,
        graph: &ContentGraph,
        j_obj: &Map<String, serde_json::Value>,
    ) -> Result<Flow, StoryError> {
        let mut flow = Flow::new(name, graph);

        flow.callstack.load_json(
            graph,
            j_obj
                .get("callstack")
                .and_then(|c| c.as_object())
                .ok_or(StoryError::BadJson("loading callstack".to_owned()))?,
        )?;

        flow.output_stream = json_read::jarray_to_runtime_obj_list(
            j_obj
                .get("outputStream")
                .and_then(|o| o.as_array())
                .ok_or(StoryError::BadJson("outputStream not found.".to_owned()))?,
        )?;

        flow.current_choices = j_obj
            .get("currentChoices")
            .and_then(|o| o.as_array())
            .ok_or(StoryError::BadJson("currentChoices not found.".to_owned()))?
            .iter()
            .map(json_read::jtoken_to_choice)
            .collect::<Result<Vec<Choice>, StoryError>>()?;

        flow.load_flow_choice_threads(graph, j_obj.get("choiceThreads"))?;

        Ok(flow)
    }

    pub(crate) fn write_json(&self, graph: &ContentGraph) -> Result<serde_json::Value, StoryError> {
        let mut flow: Map<String, serde_json::Value> = Map::new();

        flow.insert("callstack".to_owned(), self.callstack.write_json(graph)?);
        flow.insert(
            "outputStream".to_owned(),
            json_write::write_list_rt_objs(&self.output_stream)?,
        );

        // Threads of choices whose generating thread is gone are saved apart
        let mut jct: Map<String, serde_json::Value> = Map::new();
        for c in self.current_choices.iter() {
            if self
                .callstack
                .get_thread_with_index(c.original_thread_index)
                .is_none()
            {
                if let Some(thread) = &c.thread_at_generation {
                    jct.insert(c.original_thread_index.to_string(), thread.write_json(graph)?);
                }
            }
        }

        if !jct.is_empty() {
            flow.insert("choiceThreads".to_owned(), serde_json::Value::Object(jct));
        }

        let c_array: Vec<serde_json::Value> = self.current_choices.iter().map(json_write::write_choice).collect();

        flow.insert("currentChoices".to_owned(), serde_json::Value::Array(c_array));

        Ok(serde_json::Value::Object(flow))
    }

    /// Reattaches every loaded choice to the thread it was generated on,
    /// either a live thread or one saved in `choiceThreads`.
    pub(crate) fn load_flow_choice_threads(
        &mut self,
        graph: &ContentGraph,
        j_choice_threads: Option<&serde_json::Value>,
    ) -> Result<(), StoryError> {
        for choice in self.current_choices.iter_mut() {
            let thread = match self.callstack.get_thread_with_index(choice.original_thread_index) {
                Some(thread) => thread.clone(),
                None => {
                    let j_saved_choice_thread = j_choice_threads
                        .and_then(|c| c.get(choice.original_thread_index.to_string()))
                        .and_then(|t| t.as_object())
                        .ok_or_else(|| {
                            StoryError::BadJson(format!(
                                "Thread {} of choice '{}' not found in save",
                                choice.original_thread_index, choice.text
                            ))
                        })?;

                    Thread::from_json(graph, j_saved_choice_thread)?
                }
            };

            choice.thread_at_generation = Some(thread);
        }

        Ok(())
    }
}
